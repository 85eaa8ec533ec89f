use std::fmt;

use serde::Serialize;

/// Weighted losses of the gated generator-adversarial stage.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AdversarialSnapshot {
    /// `alpha * -mean(D(fake))`
    pub adversarial: f32,
    /// `gamma * normal_l1`
    pub normal_l1: f32,
    /// `gamma * lesion_l1`
    pub lesion_l1: f32,
    /// `theta * tv`
    pub tv: f32,
    pub total: f32,
}

/// Scalar losses of one training step.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LossSnapshot {
    pub epoch: usize,
    pub total_epochs: usize,
    pub batch_idx: usize,
    pub global_step: usize,

    /// `lmbda * u_loss + sigma * c_loss`
    pub generator_loss: f32,
    /// `lmbda * u_loss`
    pub reconstruction: f32,
    /// `sigma * c_loss`
    pub classification: f32,

    pub d_loss: f32,
    pub d_real_loss: f32,
    pub d_fake_loss: f32,
    pub gradient_penalty: f32,
    /// Wasserstein distance estimate, `d_real_loss + d_fake_loss`.
    pub w_distance: f32,

    /// Absent while the generator is still warming up.
    pub adversarial: Option<AdversarialSnapshot>,

    pub lr: f64,
}

impl fmt::Display for LossSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}/{}] {:.3}={:.3}(u_loss)+{:.3}(c_loss), {:.3}={:.3}(d_real_loss)+{:.3}(d_fake_loss)+{:.3}(gradient_penalty), w_distance: {:.3}",
            self.epoch,
            self.total_epochs,
            self.generator_loss,
            self.reconstruction,
            self.classification,
            self.d_loss,
            self.d_real_loss,
            self.d_fake_loss,
            self.gradient_penalty,
            self.w_distance,
        )?;
        if let Some(adv) = &self.adversarial {
            write!(
                f,
                ", {:.3}(u_d_loss)={:.3}(d_loss_)+{:.3}(normal_l1_loss)+{:.3}(lesion_l1_loss)+{:.3}(tv_loss)",
                adv.total, adv.adversarial, adv.normal_l1, adv.lesion_l1, adv.tv
            )?;
        }
        write!(f, ", lr: {:e}", self.lr)
    }
}

/// Everything the driver gets back from one step.
#[derive(Clone, Debug)]
pub struct StepStats {
    pub snapshot: LossSnapshot,
    /// Whether the snapshot landed on a logging interval.
    pub logged: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot() -> LossSnapshot {
        LossSnapshot {
            epoch: 2,
            total_epochs: 10,
            batch_idx: 20,
            global_step: 40,
            generator_loss: 1.5,
            reconstruction: 0.5,
            classification: 1.0,
            d_loss: 0.25,
            d_real_loss: -1.0,
            d_fake_loss: 0.75,
            gradient_penalty: 0.5,
            w_distance: -0.25,
            adversarial: None,
            lr: 2e-4,
        }
    }

    #[test]
    fn formats_the_warm_up_line() {
        let line = snapshot().to_string();
        assert_eq!(
            line,
            "[2/10] 1.500=0.500(u_loss)+1.000(c_loss), 0.250=-1.000(d_real_loss)+0.750(d_fake_loss)+0.500(gradient_penalty), w_distance: -0.250, lr: 2e-4"
        );
    }

    #[test]
    fn appends_the_adversarial_stage() {
        let mut snap = snapshot();
        snap.adversarial = Some(AdversarialSnapshot {
            adversarial: -0.5,
            normal_l1: 0.125,
            lesion_l1: 0.125,
            tv: 0.0,
            total: -0.25,
        });
        let line = snap.to_string();
        assert!(line.contains(", -0.250(u_d_loss)=-0.500(d_loss_)+0.125(normal_l1_loss)+0.125(lesion_l1_loss)+0.000(tv_loss)"));
        assert!(line.ends_with("lr: 2e-4"));
    }
}

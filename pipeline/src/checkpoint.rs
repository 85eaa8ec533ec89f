use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::prelude::Backend;
use burn::record::CompactRecorder;
use train::Networks;

use crate::error::Result;

/// Writes `module` to `path`. The recorder appends its own extension.
pub fn save_module<B: Backend, M: Module<B>>(module: M, path: &Path) -> Result<()> {
    module.save_file(path.to_path_buf(), &CompactRecorder::new())?;
    Ok(())
}

pub fn load_module<B: Backend, M: Module<B>>(module: M, path: &Path, device: &B::Device) -> Result<M> {
    Ok(module.load_file(path.to_path_buf(), &CompactRecorder::new(), device)?)
}

/// Saves the three networks as `{prefix}g_para`, `{prefix}d_para` and
/// `{prefix}c_para` under `dir`.
pub fn save_networks<B, G, D, C>(nets: &Networks<G, D, C>, dir: &Path, prefix: &str) -> Result<Vec<PathBuf>>
where
    B: Backend,
    G: Module<B>,
    D: Module<B>,
    C: Module<B>,
{
    let path = |net: &str| dir.join(format!("{prefix}{net}_para"));
    let paths = vec![path("g"), path("d"), path("c")];
    save_module(nets.generator.clone(), &paths[0])?;
    save_module(nets.critic.clone(), &paths[1])?;
    save_module(nets.classifier.clone(), &paths[2])?;
    log::info!("Saved network parameters to {}", dir.display());
    Ok(paths)
}

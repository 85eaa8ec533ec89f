use burn::prelude::Config;

#[derive(Config, Debug)]
pub struct LoadConfig {
    /// Max nr. of lesion/normal pairs to load.
    pub max_pairs: Option<usize>,
    /// Images are resized to a square of this size.
    #[config(default = 128)]
    pub image_size: u32,
    /// Exponent applied to the gradient weight map.
    #[config(default = 2)]
    pub power: i32,
}

#[derive(Config, Debug)]
pub struct SyntheticConfig {
    /// Nr. of lesion/normal pairs to generate.
    #[config(default = 16)]
    pub pairs: usize,
    #[config(default = 16)]
    pub image_size: usize,
    #[config(default = 3)]
    pub channels: usize,
    /// Exponent applied to the gradient weight map.
    #[config(default = 2)]
    pub power: i32,
    #[config(default = 42)]
    pub seed: u64,
}

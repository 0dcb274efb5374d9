//! Run configuration, persisted as `settings.json`.
//!
//! Field names keep the camelCase keys of existing settings files
//! (including the historical `overrallFitIters` spelling) so old files
//! keep loading.

use serde::{Deserialize, Serialize};

/// Immutable-during-run training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Reserved precision switch; carried in the record, not consulted by
    /// the trainer.
    pub high_precision: bool,
    /// Reserved dataset-randomization switch; carried, not consulted.
    pub use_random_dataset: bool,
    /// Layers per kernel stack.
    pub node_layers: usize,
    /// Kernel width and height, in weights.
    #[serde(rename = "nodesPL")]
    pub nodes_per_layer: usize,
    /// Random dataset samples averaged per fitness evaluation.
    pub fitness_average_iters: usize,
    /// Half-width of the uniform mutation noise.
    pub mutation_rate: f32,
    /// Candidates produced per generation.
    pub children_per_gen: u64,
    /// Rolling fitness window capacity.
    #[serde(rename = "overrallFitIters")]
    pub overall_fit_iters: usize,
    /// Resolution the ramp targets mid-stack.
    pub mid_layer_res: u32,
    /// Resolution the ramp targets at the final layer.
    pub out_layer_res: u32,
    /// Elite pool size carried between generations.
    pub parents_per_generation: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            high_precision: false,
            use_random_dataset: false,
            node_layers: 6,
            nodes_per_layer: 8,
            fitness_average_iters: 400,
            mutation_rate: 1.5,
            children_per_gen: 100,
            overall_fit_iters: 2000,
            mid_layer_res: 128,
            out_layer_res: 128,
            parents_per_generation: 10,
        }
    }
}

impl Settings {
    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.node_layers == 0 {
            return Err(SettingsError::InvalidLayers);
        }
        if self.nodes_per_layer == 0 {
            return Err(SettingsError::InvalidKernelSize);
        }
        if self.fitness_average_iters == 0 {
            return Err(SettingsError::InvalidFitnessIters);
        }
        if self.children_per_gen == 0 {
            return Err(SettingsError::InvalidChildren);
        }
        if self.parents_per_generation == 0 {
            return Err(SettingsError::InvalidParents);
        }
        if self.overall_fit_iters == 0 {
            return Err(SettingsError::InvalidWindow);
        }
        if self.mid_layer_res == 0 || self.out_layer_res == 0 {
            return Err(SettingsError::InvalidResolution);
        }
        if self.mutation_rate < 0.0 || !self.mutation_rate.is_finite() {
            return Err(SettingsError::InvalidMutationRate);
        }
        Ok(())
    }
}

/// Configuration validation errors. All are fatal before a run starts.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("nodeLayers must be non-zero")]
    InvalidLayers,
    #[error("nodesPL must be non-zero")]
    InvalidKernelSize,
    #[error("fitnessAverageIters must be non-zero")]
    InvalidFitnessIters,
    #[error("childrenPerGen must be non-zero")]
    InvalidChildren,
    #[error("parentsPerGeneration must be non-zero")]
    InvalidParents,
    #[error("overrallFitIters must be non-zero")]
    InvalidWindow,
    #[error("mid and output resolutions must be non-zero")]
    InvalidResolution,
    #[error("mutationRate must be finite and non-negative")]
    InvalidMutationRate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference() {
        let s = Settings::default();
        assert!(!s.high_precision);
        assert!(!s.use_random_dataset);
        assert_eq!(s.node_layers, 6);
        assert_eq!(s.nodes_per_layer, 8);
        assert_eq!(s.fitness_average_iters, 400);
        assert_eq!(s.mutation_rate, 1.5);
        assert_eq!(s.children_per_gen, 100);
        assert_eq!(s.overall_fit_iters, 2000);
        assert_eq!(s.mid_layer_res, 128);
        assert_eq!(s.out_layer_res, 128);
        assert_eq!(s.parents_per_generation, 10);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn test_serde_keys_are_camel_case() {
        let json = serde_json::to_string(&Settings::default()).unwrap();
        for key in [
            "highPrecision",
            "useRandomDataset",
            "nodeLayers",
            "nodesPL",
            "fitnessAverageIters",
            "mutationRate",
            "childrenPerGen",
            "overrallFitIters",
            "midLayerRes",
            "outLayerRes",
            "parentsPerGeneration",
        ] {
            assert!(json.contains(key), "missing key {}", key);
        }

        let parsed: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.nodes_per_layer, 8);
        assert_eq!(parsed.overall_fit_iters, 2000);
    }

    #[test]
    fn test_validate_rejects_zeros() {
        let mut s = Settings::default();
        s.children_per_gen = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidChildren)));

        let mut s = Settings::default();
        s.node_layers = 0;
        assert!(matches!(s.validate(), Err(SettingsError::InvalidLayers)));

        let mut s = Settings::default();
        s.mutation_rate = f32::NAN;
        assert!(matches!(
            s.validate(),
            Err(SettingsError::InvalidMutationRate)
        ));
    }
}

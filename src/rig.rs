// ============================================================================
// Rigging engine adapter
// ============================================================================
//
// The character rig is an external engine. This trait is the only surface the
// editor talks to; each engine version gets exactly one implementation.

use crate::error::RigError;

/// A model parameter (head angle, eye open, ...).
#[derive(Clone, Debug, PartialEq)]
pub struct RigParameter {
    pub id: String,
    pub value: f32,
    pub min: f32,
    pub max: f32,
    pub default: f32,
}

impl RigParameter {
    /// Clamp `value` into this parameter's range.
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

/// A drawable part of the model.
#[derive(Clone, Debug, PartialEq)]
pub struct RigPart {
    pub id: String,
    pub opacity: f32,
}

pub trait RigAdapter {
    fn parameters(&self) -> Vec<RigParameter>;
    fn set_parameter(&mut self, id: &str, value: f32) -> Result<(), RigError>;
    fn parts(&self) -> Vec<RigPart>;
    fn set_part_opacity(&mut self, id: &str, opacity: f32) -> Result<(), RigError>;
    /// Swap the texture of `model` for a PNG data URL.
    fn replace_texture(&mut self, model: &str, texture_data_url: &str) -> Result<(), RigError>;
    /// Rebuild the model after a texture swap.
    fn reload(&mut self) -> Result<(), RigError>;
}

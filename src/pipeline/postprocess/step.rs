//! Step and chain configuration types

pub use crate::resources::ParamValue;
use std::collections::BTreeMap;

/// One fullscreen step: a program name plus parameter overrides
#[derive(Debug, Clone, PartialEq)]
pub struct PostprocessStep {
    pub shader: String,
    pub params: BTreeMap<String, ParamValue>,
}

impl PostprocessStep {
    pub fn new(shader: impl Into<String>) -> Self {
        Self {
            shader: shader.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }
}

/// Chain a configured step belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChainTarget {
    Main,
    Bloom,
    Outline,
}

/// An already-parsed configuration record
#[derive(Debug, Clone, PartialEq)]
pub struct StepRecord {
    pub target_chain: ChainTarget,
    pub shader: String,
    pub parameters: BTreeMap<String, ParamValue>,
}

impl StepRecord {
    pub fn new(target_chain: ChainTarget, shader: impl Into<String>) -> Self {
        Self {
            target_chain,
            shader: shader.into(),
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }
}

/// Ordered step lists of the three chains
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostprocessConfig {
    pub main: Vec<PostprocessStep>,
    pub bloom: Vec<PostprocessStep>,
    pub outline: Vec<PostprocessStep>,
}

impl PostprocessConfig {
    /// Split records by chain, keeping their relative order
    pub fn from_records(records: &[StepRecord]) -> Self {
        let mut config = Self::default();
        for record in records {
            let step = PostprocessStep {
                shader: record.shader.clone(),
                params: record.parameters.clone(),
            };
            config.steps_mut(record.target_chain).push(step);
        }
        config
    }

    pub fn steps(&self, chain: ChainTarget) -> &[PostprocessStep] {
        match chain {
            ChainTarget::Main => &self.main,
            ChainTarget::Bloom => &self.bloom,
            ChainTarget::Outline => &self.outline,
        }
    }

    fn steps_mut(&mut self, chain: ChainTarget) -> &mut Vec<PostprocessStep> {
        match chain {
            ChainTarget::Main => &mut self.main,
            ChainTarget::Bloom => &mut self.bloom,
            ChainTarget::Outline => &mut self.outline,
        }
    }
}

/// How `PostprocessChain::composite` combines another chain's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Add,
    Alpha,
    Multiply,
    Screen,
}

impl BlendMode {
    /// Value of the blend program's `mode` parameter
    pub fn shader_value(self) -> f32 {
        match self {
            BlendMode::Add => 0.0,
            BlendMode::Alpha => 1.0,
            BlendMode::Multiply => 2.0,
            BlendMode::Screen => 3.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records_keeps_order_per_chain() {
        let records = vec![
            StepRecord::new(ChainTarget::Main, "grayscale"),
            StepRecord::new(ChainTarget::Bloom, "blur").with_param("radius", 4.0),
            StepRecord::new(ChainTarget::Main, "vignette"),
            StepRecord::new(ChainTarget::Outline, "passthrough"),
            StepRecord::new(ChainTarget::Main, "blur"),
        ];
        let config = PostprocessConfig::from_records(&records);
        let main: Vec<_> = config.main.iter().map(|s| s.shader.as_str()).collect();
        assert_eq!(main, ["grayscale", "vignette", "blur"]);
        assert_eq!(config.bloom[0].params["radius"], ParamValue::Scalar(4.0));
        assert_eq!(config.steps(ChainTarget::Outline).len(), 1);
    }
}

//! Cascaded biquad IIR filter.

use super::biquad::{Biquad, BiquadCoefficients};
use crate::error::{CoreError, Result};

/// Series cascade of [`Biquad`] sections.
///
/// Samples enter as `f32` and run through the sections in `f64`.
#[derive(Debug, Clone)]
pub struct IirFilter {
    sections: Vec<Biquad>,
}

impl IirFilter {
    /// Build a cascade from designed sections.
    ///
    /// Fails with [`CoreError::InvalidParameter`] if there are no sections or
    /// any coefficient is not finite.
    pub fn new(sections: &[BiquadCoefficients]) -> Result<Self> {
        if sections.is_empty() {
            return Err(CoreError::invalid_parameter(
                "sections",
                "an IIR filter needs at least one section",
            ));
        }
        if let Some(i) = sections.iter().position(|c| !c.is_finite()) {
            return Err(CoreError::invalid_parameter(
                "sections",
                format!("section {i} has non-finite coefficients"),
            ));
        }
        Ok(Self {
            sections: sections.iter().copied().map(Biquad::new).collect(),
        })
    }

    /// Number of sections.
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// True if the cascade has no sections (never, once constructed).
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        self.sections
            .iter_mut()
            .fold(f64::from(input), |x, section| section.process(x)) as f32
    }

    /// Filter a block.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        for (out, &x) in output.iter_mut().zip(input) {
            *out = self.process(x);
        }
    }

    /// Per-section memory, `[x1, x2, y1, y2]` each.
    pub fn memories(&self) -> Vec<[f64; 4]> {
        self.sections.iter().map(Biquad::memory).collect()
    }

    /// Restore per-section memory. Nothing changes on error.
    pub fn set_memories(&mut self, memories: &[[f64; 4]]) -> Result<()> {
        if memories.len() != self.sections.len() {
            return Err(CoreError::shape_mismatch(
                "iir section memory",
                self.sections.len(),
                memories.len(),
            ));
        }
        for (section, &memory) in self.sections.iter_mut().zip(memories) {
            section.set_memory(memory);
        }
        Ok(())
    }

    /// Clear every section's memory.
    pub fn reset(&mut self) {
        self.sections.iter_mut().for_each(Biquad::clear);
    }

    /// Cascade magnitude response at `frequency` Hz.
    pub fn magnitude_at(&self, frequency: f64, sample_rate: f64) -> f64 {
        self.sections
            .iter()
            .map(|s| s.coefficients().magnitude_at(frequency, sample_rate))
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::biquad::lowpass;

    #[test]
    fn empty_cascade_rejected() {
        assert!(IirFilter::new(&[]).is_err());
    }

    #[test]
    fn non_finite_rejected() {
        let mut bad = BiquadCoefficients::identity();
        bad.a1 = f64::NAN;
        assert!(IirFilter::new(&[bad]).is_err());
    }

    #[test]
    fn test_cascade_matches_sections_in_series() {
        let a = lowpass(1000.0, 0.6, 48000.0);
        let b = lowpass(2000.0, 1.2, 48000.0);
        let mut cascade = IirFilter::new(&[a, b]).unwrap();
        let mut s1 = Biquad::new(a);
        let mut s2 = Biquad::new(b);
        for i in 0..64 {
            let x = ((i * 37) % 11) as f32 - 5.0;
            let expected = s2.process(s1.process(f64::from(x))) as f32;
            assert_eq!(cascade.process(x), expected);
        }
    }

    #[test]
    fn memory_shape_checked() {
        let mut f = IirFilter::new(&[BiquadCoefficients::identity()]).unwrap();
        assert!(f.set_memories(&[[0.0; 4], [0.0; 4]]).is_err());
        f.set_memories(&[[1.0, 2.0, 3.0, 4.0]]).unwrap();
        assert_eq!(f.memories(), vec![[1.0, 2.0, 3.0, 4.0]]);
        f.reset();
        assert_eq!(f.memories(), vec![[0.0; 4]]);
    }
}

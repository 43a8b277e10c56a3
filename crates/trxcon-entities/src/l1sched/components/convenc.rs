// Convolutional encoder for GSM, 3GPP TS 45.003 clause 4.1.3

/// State of the rate-1/2, constraint length 5 encoder with
/// G0 = 1 + D^3 + D^4 and G1 = 1 + D + D^3 + D^4.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConvEncState {
    /// delayed[0] holds the previous input bit (D), delayed[3] the one four bits ago (D^4)
    delayed: [u8; 4],
}

impl ConvEncState {
    /// Create a new encoder state (all zeros).
    #[inline]
    pub fn new() -> Self {
        Self { delayed: [0; 4] }
    }

    #[inline]
    pub fn reset(&mut self) {
        self.delayed = [0; 4];
    }

    #[inline(always)]
    fn encode_bit(&mut self, bit: u8) -> (u8, u8) {
        let [d0, d1, d2, d3] = self.delayed;

        let g0 = bit ^ d2 ^ d3;
        let g1 = bit ^ d0 ^ d2 ^ d3;

        self.delayed = [bit, d0, d1, d2];
        (g0, g1)
    }

    /// Encode `input` (one bit per byte) into `2 * input.len()` bits in `output`.
    /// Panics if `output` is too short.
    pub fn encode(&mut self, input: &[u8], output: &mut [u8]) {
        assert!(output.len() >= input.len() * 2);
        for (i, &bit) in input.iter().enumerate() {
            let (g0, g1) = self.encode_bit(bit & 1);
            output[2 * i] = g0;
            output[2 * i + 1] = g1;
        }
    }
}

/// Encode a complete block, starting from the all-zero state
pub fn conv_encode(input: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; input.len() * 2];
    ConvEncState::new().encode(input, &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_response() {
        // A single 1 followed by zeros yields the generator polynomials, interleaved
        let out = conv_encode(&[1, 0, 0, 0, 0]);
        let g0: Vec<u8> = out.iter().step_by(2).copied().collect();
        let g1: Vec<u8> = out.iter().skip(1).step_by(2).copied().collect();
        assert_eq!(g0, vec![1, 0, 0, 1, 1]);
        assert_eq!(g1, vec![1, 1, 0, 1, 1]);
    }
}

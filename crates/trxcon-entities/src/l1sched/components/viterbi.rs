/// Type used to represent input bits.
/// "0" is represented as -1, "1" as +1, and an erased bit as 0.
/// Soft decision decoding uses larger magnitudes for more likely bits.
/// Note that this is the opposite sign of the burst soft bits, callers negate.
pub type SoftBit = i8;

/// Type used to accumulate path metrics.
/// Burst soft bits reach a magnitude of 127 and blocks run up to 228 steps,
/// which does not fit in 16 bits.
type Metric = i32;

/// Constraint length of the code.
const K: usize = 5;

const NUM_STATES: usize = num_states(K);

/// Unsigned integer type used to store decisions for each state in trellis.
/// Each bit represents a decision for a given state.
type DecisionBitmap = u16;

/// Number of states for a given constraint length.
pub const fn num_states(k: usize) -> usize {
    1 << (k - 1)
}

/// Viterbi decoder for a binary convolutional code of rate 1/N.
pub struct ViterbiDecoder<const N: usize> {
    /// Expected encoder outputs for each state for encoder input "0".
    expected_0: [[SoftBit; NUM_STATES]; N],
}

impl<const N: usize> ViterbiDecoder<N> {
    /// Polynomials are given as coefficients of [D^0, D^1, D^2, D^3, D^4].
    /// The D^4 coefficient has to be set for every polynomial.
    pub fn new_with_polynomials(generator_polynomials: &[[bool; K]; N]) -> Self {
        // The outputs for the "1" branch are the inverse of the "0" branch
        // since every polynomial taps D^4, so only the "0" table is kept.
        let expected_0 = std::array::from_fn(|poly_n| {
            let poly = generator_polynomials[poly_n];
            std::array::from_fn(|state| {
                let mut encoder_output: bool = false;
                for bit_i in 0..K - 1 {
                    let past_input_bit = (state & (1 << (K - 2 - bit_i))) != 0;
                    if past_input_bit && poly[bit_i] {
                        encoder_output = !encoder_output;
                    }
                }
                if encoder_output { 1 as SoftBit } else { -1 as SoftBit }
            })
        });
        Self { expected_0 }
    }

    /// Decodes a terminated code word. Returns one bit per N received bits, tail included.
    pub fn decode(&self, received_bits: &[SoftBit]) -> Vec<u8> {
        let num_output_bits = received_bits.len() / N;
        let mut trellis_decisions: Vec<DecisionBitmap> = Vec::with_capacity(num_output_bits);

        // Encoder starts in state 0, the others start with a metric high enough to never be
        // chosen while leaving headroom to accumulate on top of it.
        let mut metrics: [Metric; NUM_STATES] = [Metric::MAX / 2; NUM_STATES];
        metrics[0] = 0;

        for received_bits_for_one_output_bit in received_bits.chunks_exact(N) {
            let mut branch_metrics_0: [Metric; NUM_STATES] = [0; NUM_STATES];

            for (received_bit, expected_0) in received_bits_for_one_output_bit.iter().zip(self.expected_0.iter()) {
                for (branch_metric_0, expected_bit_0) in branch_metrics_0.iter_mut().zip(expected_0.iter()) {
                    *branch_metric_0 -= *received_bit as Metric * *expected_bit_0 as Metric;
                }
            }

            let mut decisions: DecisionBitmap = 0;

            metrics = std::array::from_fn(|state| {
                let predecessor_0 = (state * 2) % NUM_STATES;
                let predecessor_1 = predecessor_0 + 1;
                let metric_0 = metrics[predecessor_0] + branch_metrics_0[state];
                let metric_1 = metrics[predecessor_1] - branch_metrics_0[state];

                if metric_1 < metric_0 {
                    decisions |= 1 << state;
                    metric_1
                } else {
                    metric_0
                }
            });
            trellis_decisions.push(decisions);
        }

        // Tail bits bring the encoder back to state 0
        let mut best_state = 0;

        let mut decoded_bits: Vec<u8> = Vec::with_capacity(num_output_bits);
        for decisions in trellis_decisions.iter().rev() {
            decoded_bits.push(((best_state >> (K - 2)) & 1) as u8);
            best_state = best_state * 2 % NUM_STATES + ((*decisions >> best_state) & 1) as usize;
        }
        decoded_bits.reverse();
        decoded_bits
    }
}

/// Decoder for the rate 1/2 code used by all GMSK control and full rate channels
pub type GsmViterbiDecoder = ViterbiDecoder<2>;

impl GsmViterbiDecoder {
    pub fn new() -> Self {
        Self::new_with_polynomials(&[
            // G0 = 1 + D^3 + D^4
            [true, false, false, true, true],
            // G1 = 1 + D + D^3 + D^4
            [true, true, false, true, true],
        ])
    }
}

impl Default for GsmViterbiDecoder {
    fn default() -> Self {
        Self::new()
    }
}

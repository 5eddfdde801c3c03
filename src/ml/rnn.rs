// ============================================================
// Layer 5 — Recurrent Cells
// ============================================================
// GRU and LSTM cells built from plain Linear layers, stepped
// one timestep at a time on the host. Burn ships no recurrent
// module with per-step masking, and the decoder needs per-step
// control anyway (attention sits between its stacks), so both
// directions of the encoder reuse the same step cells.
//
// Gate maths:
//   GRU:  r = σ(Wr·[x,h])   z = σ(Wz·[x,h])
//         n = tanh(Wn·[x, r⊙h])
//         h' = (1-z)⊙n + z⊙h
//   LSTM: [i,f,g,o] = W·[x,h]  (one Linear, sliced)
//         c' = σ(f)⊙c + σ(i)⊙tanh(g)
//         h' = σ(o)⊙tanh(c')
//

use burn::{
    module::Module,
    nn::{Dropout, DropoutConfig, Initializer, Linear, LinearConfig},
    tensor::{activation, backend::Backend, Tensor},
};

use super::options::RnnKind;

/// A Linear layer with Kaiming-normal weight init, the scheme
/// every projection in this model uses.
pub(crate) fn kaiming_linear<B: Backend>(
    input: usize,
    output: usize,
    bias: bool,
    device: &B::Device,
) -> Linear<B> {
    LinearConfig::new(input, output)
        .with_bias(bias)
        .with_initializer(Initializer::KaimingNormal {
            gain: 1.0,
            fan_out_only: false,
        })
        .init(device)
}

/// Gate projections for one GRU layer.
#[derive(Module, Debug)]
pub struct GruGates<B: Backend> {
    reset: Linear<B>,
    update: Linear<B>,
    candidate: Linear<B>,
}

/// Gate projections for one LSTM layer: input, forget, cell and
/// output gates packed into a single Linear and sliced apart.
#[derive(Module, Debug)]
pub struct LstmGates<B: Backend> {
    gates: Linear<B>,
    hidden_size: usize,
}

/// Recurrent state carried across timesteps.
///
/// `cell` is present for LSTM layers only.
#[derive(Debug, Clone)]
pub struct RnnState<B: Backend> {
    pub hidden: Tensor<B, 2>,
    pub cell: Option<Tensor<B, 2>>,
}

/// One recurrent layer, GRU or LSTM.
///
/// Exactly one of the gate fields is populated; `kind` at build
/// time decides which.
#[derive(Module, Debug)]
pub struct Rnn<B: Backend> {
    gru: Option<GruGates<B>>,
    lstm: Option<LstmGates<B>>,
    hidden_size: usize,
}

impl<B: Backend> Rnn<B> {
    pub fn new(kind: RnnKind, input_size: usize, hidden_size: usize, device: &B::Device) -> Self {
        let (gru, lstm) = match kind {
            RnnKind::Gru => (
                Some(GruGates {
                    reset: kaiming_linear(input_size + hidden_size, hidden_size, true, device),
                    update: kaiming_linear(input_size + hidden_size, hidden_size, true, device),
                    candidate: kaiming_linear(input_size + hidden_size, hidden_size, true, device),
                }),
                None,
            ),
            RnnKind::Lstm => (
                None,
                Some(LstmGates {
                    gates: kaiming_linear(input_size + hidden_size, 4 * hidden_size, true, device),
                    hidden_size,
                }),
            ),
        };
        Self {
            gru,
            lstm,
            hidden_size,
        }
    }

    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    /// All-zero state for a batch.
    pub fn init_state(&self, batch: usize, device: &B::Device) -> RnnState<B> {
        RnnState {
            hidden: Tensor::zeros([batch, self.hidden_size], device),
            cell: self
                .lstm
                .as_ref()
                .map(|_| Tensor::zeros([batch, self.hidden_size], device)),
        }
    }

    /// State seeded from a [batch, hidden] tensor. LSTM cells
    /// start at zero; only the hidden is seeded.
    pub fn seeded_state(&self, hidden: Tensor<B, 2>) -> RnnState<B> {
        RnnState {
            cell: self.lstm.as_ref().map(|_| hidden.zeros_like()),
            hidden,
        }
    }

    /// Advance one timestep. The new hidden doubles as the
    /// layer's output.
    pub fn step(&self, x: Tensor<B, 2>, state: &RnnState<B>) -> RnnState<B> {
        match (&self.gru, &self.lstm) {
            (Some(g), _) => {
                let h = state.hidden.clone();
                let xh = Tensor::cat(vec![x.clone(), h.clone()], 1);
                let r = activation::sigmoid(g.reset.forward(xh.clone()));
                let z = activation::sigmoid(g.update.forward(xh));
                let n = activation::tanh(g.candidate.forward(Tensor::cat(vec![x, h.clone() * r], 1)));
                let hidden = (z.ones_like() - z.clone()) * n + z * h;
                RnnState { hidden, cell: None }
            }
            (_, Some(l)) => {
                let prev_cell = state
                    .cell
                    .clone()
                    .unwrap_or_else(|| state.hidden.zeros_like());
                let xh = Tensor::cat(vec![x, state.hidden.clone()], 1);
                let gates = l.gates.forward(xh);
                let [batch, _] = gates.dims();
                let h = l.hidden_size;
                let i = activation::sigmoid(gates.clone().slice([0..batch, 0..h]));
                let f = activation::sigmoid(gates.clone().slice([0..batch, h..2 * h]));
                let g = activation::tanh(gates.clone().slice([0..batch, 2 * h..3 * h]));
                let o = activation::sigmoid(gates.slice([0..batch, 3 * h..4 * h]));
                let cell = f * prev_cell + i * g;
                let hidden = o * activation::tanh(cell.clone());
                RnnState {
                    hidden,
                    cell: Some(cell),
                }
            }
            _ => unreachable!("an Rnn is always built with exactly one cell kind"),
        }
    }

    /// Run a whole [batch, time, input] sequence, returning the
    /// output at every timestep plus the final state.
    ///
    /// When `mask` is given (1 real token, 0 pad), a padded step
    /// carries the previous state through unchanged. `reverse`
    /// walks right-to-left and writes each output back to its
    /// original position, which is how the backward half of a
    /// bidirectional encoder runs.
    pub fn forward_seq(
        &self,
        x: Tensor<B, 3>,
        mask: Option<&Tensor<B, 2>>,
        reverse: bool,
        state0: RnnState<B>,
    ) -> (Tensor<B, 3>, RnnState<B>) {
        let [batch, steps, _] = x.dims();
        let order: Vec<usize> = if reverse {
            (0..steps).rev().collect()
        } else {
            (0..steps).collect()
        };

        let mut state = state0;
        let mut outputs: Vec<Option<Tensor<B, 2>>> = vec![None; steps];
        for t in order {
            let x_t = x
                .clone()
                .slice([0..batch, t..t + 1])
                .reshape([batch as i32, -1]);
            let next = self.step(x_t, &state);
            let state_t = match mask {
                Some(m) => {
                    let m_t = m.clone().slice([0..batch, t..t + 1]);
                    let keep = m_t.ones_like() - m_t.clone();
                    let cell = match (next.cell, state.cell.clone()) {
                        (Some(new_c), Some(old_c)) => {
                            Some(new_c * m_t.clone() + old_c * keep.clone())
                        }
                        (new_c, _) => new_c,
                    };
                    RnnState {
                        hidden: next.hidden * m_t + state.hidden.clone() * keep,
                        cell,
                    }
                }
                None => next,
            };
            outputs[t] = Some(state_t.hidden.clone());
            state = state_t;
        }

        let outputs: Vec<Tensor<B, 3>> = outputs
            .into_iter()
            .flatten()
            .map(|h| h.reshape([batch, 1, self.hidden_size]))
            .collect();
        (Tensor::cat(outputs, 1), state)
    }
}

/// A stack of recurrent layers with dropout between them.
#[derive(Module, Debug)]
pub struct RnnStack<B: Backend> {
    layers: Vec<Rnn<B>>,
    dropout: Dropout,
}

impl<B: Backend> RnnStack<B> {
    pub fn new(
        kind: RnnKind,
        input_size: usize,
        hidden_size: usize,
        n_layers: usize,
        dropout: f64,
        device: &B::Device,
    ) -> Self {
        let layers = (0..n_layers)
            .map(|i| {
                let in_size = if i == 0 { input_size } else { hidden_size };
                Rnn::new(kind, in_size, hidden_size, device)
            })
            .collect();
        Self {
            layers,
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn init_state(&self, batch: usize, device: &B::Device) -> Vec<RnnState<B>> {
        self.layers
            .iter()
            .map(|l| l.init_state(batch, device))
            .collect()
    }

    /// Seed every layer's hidden with the same tensor.
    pub fn seeded_state(&self, hidden: &Tensor<B, 2>) -> Vec<RnnState<B>> {
        self.layers
            .iter()
            .map(|l| l.seeded_state(hidden.clone()))
            .collect()
    }

    /// One timestep through every layer. Returns the top
    /// layer's output and the per-layer states.
    pub fn step(&self, x: Tensor<B, 2>, states: &[RnnState<B>]) -> (Tensor<B, 2>, Vec<RnnState<B>>) {
        debug_assert_eq!(states.len(), self.layers.len());
        let mut next_states = Vec::with_capacity(self.layers.len());
        let mut carry = x;
        for (i, (layer, state)) in self.layers.iter().zip(states).enumerate() {
            let next = layer.step(carry, state);
            carry = next.hidden.clone();
            if i + 1 < self.layers.len() {
                carry = self.dropout.forward(carry);
            }
            next_states.push(next);
        }
        (carry, next_states)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;

    type TestBackend = burn::backend::NdArray;

    fn device() -> NdArrayDevice {
        NdArrayDevice::default()
    }

    #[test]
    fn test_gru_step_shapes() {
        let rnn = Rnn::<TestBackend>::new(RnnKind::Gru, 4, 6, &device());
        let state = rnn.init_state(3, &device());
        let x = Tensor::zeros([3, 4], &device());
        let next = rnn.step(x, &state);
        assert_eq!(next.hidden.dims(), [3, 6]);
        assert!(next.cell.is_none());
    }

    #[test]
    fn test_lstm_step_carries_cell() {
        let rnn = Rnn::<TestBackend>::new(RnnKind::Lstm, 4, 6, &device());
        let state = rnn.init_state(2, &device());
        assert!(state.cell.is_some());
        let x = Tensor::ones([2, 4], &device());
        let next = rnn.step(x, &state);
        assert_eq!(next.hidden.dims(), [2, 6]);
        assert_eq!(next.cell.unwrap().dims(), [2, 6]);
    }

    #[test]
    fn test_forward_seq_shapes() {
        let rnn = Rnn::<TestBackend>::new(RnnKind::Gru, 4, 6, &device());
        let x = Tensor::ones([2, 5, 4], &device());
        let state = rnn.init_state(2, &device());
        let (out, last) = rnn.forward_seq(x, None, false, state);
        assert_eq!(out.dims(), [2, 5, 6]);
        assert_eq!(last.hidden.dims(), [2, 6]);
    }

    #[test]
    fn test_masked_steps_keep_state() {
        let rnn = Rnn::<TestBackend>::new(RnnKind::Gru, 3, 5, &device());
        let x = Tensor::ones([1, 4, 3], &device());
        // only the first two steps are real
        let mask = Tensor::<TestBackend, 1>::from_floats([1.0, 1.0, 0.0, 0.0].as_slice(), &device())
            .reshape([1, 4]);
        let state = rnn.init_state(1, &device());
        let (out, last) = rnn.forward_seq(x, Some(&mask), false, state);

        // final state equals the output written at the last real step
        let h2: Vec<f32> = out
            .slice([0..1, 1..2])
            .reshape([5])
            .to_data()
            .convert::<f32>()
            .to_vec()
            .unwrap();
        let hf: Vec<f32> = last.hidden.reshape([5]).to_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(h2, hf);
    }

    #[test]
    fn test_fully_masked_row_returns_initial_state() {
        let rnn = Rnn::<TestBackend>::new(RnnKind::Lstm, 3, 4, &device());
        let x = Tensor::ones([1, 3, 3], &device());
        let mask = Tensor::<TestBackend, 1>::from_floats([0.0, 0.0, 0.0].as_slice(), &device())
            .reshape([1, 3]);
        let state = rnn.init_state(1, &device());
        let (_, last) = rnn.forward_seq(x, Some(&mask), false, state);
        let hf: Vec<f32> = last.hidden.reshape([4]).to_data().convert::<f32>().to_vec().unwrap();
        assert_eq!(hf, vec![0.0; 4]);
    }

    #[test]
    fn test_reverse_writes_back_in_order() {
        let rnn = Rnn::<TestBackend>::new(RnnKind::Gru, 2, 3, &device());
        let x = Tensor::ones([2, 4, 2], &device());
        let state = rnn.init_state(2, &device());
        let (out, _) = rnn.forward_seq(x, None, true, state);
        assert_eq!(out.dims(), [2, 4, 3]);
    }

    #[test]
    fn test_stack_steps_through_layers() {
        let stack = RnnStack::<TestBackend>::new(RnnKind::Gru, 4, 6, 2, 0.0, &device());
        assert_eq!(stack.n_layers(), 2);
        let states = stack.init_state(3, &device());
        let (out, next) = stack.step(Tensor::ones([3, 4], &device()), &states);
        assert_eq!(out.dims(), [3, 6]);
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn test_seeded_state_reaches_every_layer() {
        let stack = RnnStack::<TestBackend>::new(RnnKind::Lstm, 4, 6, 3, 0.0, &device());
        let seed = Tensor::ones([2, 6], &device());
        let states = stack.seeded_state(&seed);
        assert_eq!(states.len(), 3);
        for s in &states {
            let h: Vec<f32> = s
                .hidden
                .clone()
                .reshape([12])
                .to_data()
                .convert::<f32>()
                .to_vec()
                .unwrap();
            assert_eq!(h, vec![1.0; 12]);
            assert!(s.cell.is_some());
        }
    }
}

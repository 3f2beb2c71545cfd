//! Padded tensor collation for tokenized observations.
//!
//! ```text
//!   Observation ids        input_ids [batch, max_len]    attention_mask
//!   [5, 6, 7]          ─►  [5, 6, 7]                     [1, 1, 1]
//!   [8]                ─►  [8, pad, pad]                 [1, 0, 0]
//! ```

use candle_core::{Device, Tensor};

use super::BatchAssembler;
use crate::config::CollateConfig;
use crate::error::{Error, Result};
use crate::transform::Observation;

/// A collated batch of observations.
#[derive(Debug, Clone)]
pub struct TensorBatch {
    /// Right-padded token ids, `[batch_size, max_len]`, u32.
    pub input_ids: Tensor,
    /// 1 where `input_ids` holds a real token, `[batch_size, max_len]`, u8.
    pub attention_mask: Tensor,
    /// Unpadded length of each row.
    pub lengths: Vec<usize>,
    /// Source observations, one per row.
    pub observations: Vec<Observation>,
    /// Number of rows.
    pub batch_size: usize,
}

/// Collates [`Observation`]s into padded tensors on a device.
#[derive(Debug, Clone)]
pub struct TensorAssembler {
    pad_token_id: u32,
    device: Device,
}

impl TensorAssembler {
    /// Create an assembler that places tensors on `device`.
    pub fn new(config: &CollateConfig, device: Device) -> Self {
        Self {
            pad_token_id: config.pad_token_id,
            device,
        }
    }

    /// CPU assembler with default settings.
    pub fn cpu() -> Self {
        Self::new(&CollateConfig::default(), Device::Cpu)
    }

    /// Target device.
    pub fn device(&self) -> &Device {
        &self.device
    }
}

impl BatchAssembler<Observation> for TensorAssembler {
    type Batch = TensorBatch;

    fn assemble(&self, observations: Vec<Observation>) -> Result<TensorBatch> {
        if observations.is_empty() {
            return Err(Error::Assembly("cannot collate an empty round".into()));
        }

        let batch_size = observations.len();
        let lengths: Vec<usize> = observations.iter().map(|o| o.token_ids.len()).collect();
        // Keep at least one column so every row has a shape.
        let max_len = lengths.iter().copied().max().unwrap_or(0).max(1);

        let mut ids = Vec::with_capacity(batch_size * max_len);
        let mut mask = Vec::with_capacity(batch_size * max_len);
        for obs in &observations {
            let len = obs.token_ids.len();
            ids.extend_from_slice(&obs.token_ids);
            ids.extend(std::iter::repeat(self.pad_token_id).take(max_len - len));
            mask.extend(std::iter::repeat(1u8).take(len));
            mask.extend(std::iter::repeat(0u8).take(max_len - len));
        }

        let input_ids = Tensor::from_vec(ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(mask, (batch_size, max_len), &self.device)?;

        Ok(TensorBatch {
            input_ids,
            attention_mask,
            lengths,
            observations,
            batch_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(ids: &[u32]) -> Observation {
        Observation {
            text: String::new(),
            labels: Vec::new(),
            token_ids: ids.to_vec(),
            episode_done: false,
            turn: 0,
        }
    }

    #[test]
    fn test_pads_to_longest_row() {
        let assembler = TensorAssembler::cpu();
        let batch = assembler
            .assemble(vec![obs(&[5, 6, 7]), obs(&[8])])
            .unwrap();

        assert_eq!(batch.batch_size, 2);
        assert_eq!(batch.lengths, vec![3, 1]);
        assert_eq!(batch.input_ids.dims2().unwrap(), (2, 3));
        assert_eq!(
            batch.input_ids.to_vec2::<u32>().unwrap(),
            vec![vec![5, 6, 7], vec![8, 0, 0]]
        );
        assert_eq!(
            batch.attention_mask.to_vec2::<u8>().unwrap(),
            vec![vec![1, 1, 1], vec![1, 0, 0]]
        );
    }

    #[test]
    fn test_custom_pad_id() {
        let config = CollateConfig { pad_token_id: 2 };
        let assembler = TensorAssembler::new(&config, Device::Cpu);
        let batch = assembler.assemble(vec![obs(&[9, 9]), obs(&[])]).unwrap();
        assert_eq!(
            batch.input_ids.to_vec2::<u32>().unwrap(),
            vec![vec![9, 9], vec![2, 2]]
        );
    }

    #[test]
    fn test_all_empty_rows_keep_one_column() {
        let batch = TensorAssembler::cpu().assemble(vec![obs(&[])]).unwrap();
        assert_eq!(batch.input_ids.dims2().unwrap(), (1, 1));
        assert_eq!(batch.lengths, vec![0]);
    }

    #[test]
    fn test_empty_round_rejected() {
        let result = TensorAssembler::cpu().assemble(Vec::new());
        assert!(matches!(result, Err(Error::Assembly(_))));
    }
}

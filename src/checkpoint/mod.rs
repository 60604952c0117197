//! SafeTensors checkpoints of gated encoders
//!
//! Every tensor carries a kind tag in the header metadata, keyed by the
//! tensor name, so gate parameters can be enumerated without parsing names:
//!
//! - `weight`: `{projection}/down/kernel`, `{projection}/up/kernel`,
//!   `{projection}/up/bias`
//! - `gate`: `{projection}/gate/log_alpha`
//! - `multiplier`: `controller/lambda`, `controller/alpha`
//! - `step`: `controller/global_step` (I64)


use crate::encoder::PrunableEncoder;
use crate::error::{FlopError, Result};
use crate::sparsity::{DualAscentController, LagrangeMultipliers};
use ndarray::{ArrayD, IxDyn};
use safetensors::tensor::{Dtype, TensorView};
use safetensors::SafeTensors;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Name of the linear multiplier tensor.
pub const LAMBDA_TENSOR: &str = "controller/lambda";
/// Name of the quadratic multiplier tensor.
pub const ALPHA_TENSOR: &str = "controller/alpha";
/// Name of the global step tensor.
pub const STEP_TENSOR: &str = "controller/global_step";

/// Role of a tensor in a checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TensorKind {
    /// Projection weight or bias.
    Weight,
    /// Gate `log_alpha`.
    Gate,
    /// Lagrange multiplier.
    Multiplier,
    /// Global step counter.
    Step,
}

impl TensorKind {
    /// Tag written to the header metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            TensorKind::Weight => "weight",
            TensorKind::Gate => "gate",
            TensorKind::Multiplier => "multiplier",
            TensorKind::Step => "step",
        }
    }
}

impl fmt::Display for TensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TensorKind {
    type Err = FlopError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "weight" => Ok(TensorKind::Weight),
            "gate" => Ok(TensorKind::Gate),
            "multiplier" => Ok(TensorKind::Multiplier),
            "step" => Ok(TensorKind::Step),
            other => Err(FlopError::Checkpoint(format!("unknown tensor kind tag '{other}'"))),
        }
    }
}

/// One stored f32 tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointTensor {
    /// Kind tag.
    pub kind: TensorKind,
    /// Values in row-major order.
    pub value: ArrayD<f32>,
}

/// Model and controller state at one step.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    tensors: BTreeMap<String, CheckpointTensor>,
    multipliers: LagrangeMultipliers,
    global_step: usize,
}

impl Checkpoint {
    /// Snapshot an encoder and its controller.
    pub fn capture(encoder: &PrunableEncoder, controller: &DualAscentController) -> Self {
        let tensors = encoder
            .named_parameters()
            .into_iter()
            .map(|p| (p.name, CheckpointTensor { kind: p.kind, value: p.value.to_owned() }))
            .collect();
        Self {
            tensors,
            multipliers: controller.multipliers(),
            global_step: controller.global_step(),
        }
    }

    /// Global step at capture time.
    pub fn global_step(&self) -> usize {
        self.global_step
    }

    /// Multipliers at capture time.
    pub fn multipliers(&self) -> LagrangeMultipliers {
        self.multipliers
    }

    /// Look up a weight or gate tensor.
    pub fn tensor(&self, name: &str) -> Option<&CheckpointTensor> {
        self.tensors.get(name)
    }

    /// Weight and gate tensors sorted by name.
    pub fn tensors(&self) -> impl Iterator<Item = (&str, &CheckpointTensor)> {
        self.tensors.iter().map(|(name, t)| (name.as_str(), t))
    }

    /// Gate tensors only, found through their kind tag.
    pub fn gate_parameters(&self) -> impl Iterator<Item = (&str, &CheckpointTensor)> {
        self.tensors().filter(|(_, t)| t.kind == TensorKind::Gate)
    }

    /// Weight and gate values keyed by name, as consumed by
    /// [`PrunableEncoder::load_parameters`].
    pub fn parameters(&self) -> HashMap<String, ArrayD<f32>> {
        self.tensors.iter().map(|(name, t)| (name.clone(), t.value.clone())).collect()
    }

    /// Load the stored state into an encoder and controller.
    pub fn restore(
        &self,
        encoder: &mut PrunableEncoder,
        controller: &mut DualAscentController,
    ) -> Result<()> {
        encoder.load_parameters(&self.parameters())?;
        controller.restore(self.global_step, self.multipliers);
        Ok(())
    }

    /// Serialize to SafeTensors bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let step_bytes = (self.global_step as i64).to_le_bytes().to_vec();
        let lambda_bytes = self.multipliers.lambda.to_le_bytes().to_vec();
        let alpha_bytes = self.multipliers.alpha.to_le_bytes().to_vec();

        let tensor_data: Vec<(&str, TensorKind, Vec<usize>, Vec<u8>)> = self
            .tensors
            .iter()
            .map(|(name, t)| {
                let values: Vec<f32> = t.value.iter().copied().collect();
                let bytes = bytemuck::cast_slice::<f32, u8>(&values).to_vec();
                (name.as_str(), t.kind, t.value.shape().to_vec(), bytes)
            })
            .collect();

        let mut metadata = HashMap::new();
        let mut views: Vec<(&str, TensorView<'_>)> = Vec::with_capacity(tensor_data.len() + 3);
        for (name, kind, shape, bytes) in &tensor_data {
            metadata.insert((*name).to_string(), kind.as_str().to_string());
            views.push((*name, TensorView::new(Dtype::F32, shape.clone(), bytes)?));
        }
        for (name, dtype, kind, bytes) in [
            (LAMBDA_TENSOR, Dtype::F32, TensorKind::Multiplier, &lambda_bytes),
            (ALPHA_TENSOR, Dtype::F32, TensorKind::Multiplier, &alpha_bytes),
            (STEP_TENSOR, Dtype::I64, TensorKind::Step, &step_bytes),
        ] {
            metadata.insert(name.to_string(), kind.as_str().to_string());
            views.push((name, TensorView::new(dtype, vec![1], bytes)?));
        }

        Ok(safetensors::serialize(views, Some(metadata))?)
    }

    /// Parse SafeTensors bytes written by [`Self::to_bytes`].
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (_, header) = SafeTensors::read_metadata(data)?;
        let kinds = header
            .metadata()
            .as_ref()
            .ok_or_else(|| FlopError::Checkpoint("header has no kind tags".into()))?;
        let st = SafeTensors::deserialize(data)?;

        let mut tensors = BTreeMap::new();
        let mut lambda = None;
        let mut alpha = None;
        let mut global_step = None;

        for name in st.names() {
            let name: &str = &name[..];
            let kind: TensorKind = kinds
                .get(name)
                .ok_or_else(|| FlopError::Checkpoint(format!("tensor {name} has no kind tag")))?
                .parse()?;
            let view = st.tensor(name)?;

            match kind {
                TensorKind::Step => {
                    if view.dtype() != Dtype::I64 || view.data().len() != 8 {
                        return Err(FlopError::Checkpoint(format!("{name} must be a single I64")));
                    }
                    let mut raw = [0u8; 8];
                    raw.copy_from_slice(view.data());
                    global_step = Some(usize::try_from(i64::from_le_bytes(raw)).map_err(|_| {
                        FlopError::Checkpoint(format!("{name} holds a negative step"))
                    })?);
                }
                TensorKind::Multiplier => {
                    let values = read_f32(name, view.dtype(), view.data())?;
                    let value = match values.as_slice() {
                        [v] => *v,
                        _ => {
                            return Err(FlopError::Checkpoint(format!("{name} must hold one value")))
                        }
                    };
                    match name {
                        LAMBDA_TENSOR => lambda = Some(value),
                        ALPHA_TENSOR => alpha = Some(value),
                        other => {
                            return Err(FlopError::Checkpoint(format!("unknown multiplier {other}")))
                        }
                    }
                }
                TensorKind::Weight | TensorKind::Gate => {
                    let values = read_f32(name, view.dtype(), view.data())?;
                    let value = ArrayD::from_shape_vec(IxDyn(view.shape()), values)
                        .map_err(|e| FlopError::Checkpoint(format!("{name}: {e}")))?;
                    tensors.insert(name.to_string(), CheckpointTensor { kind, value });
                }
            }
        }

        Ok(Self {
            tensors,
            multipliers: LagrangeMultipliers {
                lambda: lambda.ok_or_else(|| FlopError::MissingTensor(LAMBDA_TENSOR.into()))?,
                alpha: alpha.ok_or_else(|| FlopError::MissingTensor(ALPHA_TENSOR.into()))?,
            },
            global_step: global_step.ok_or_else(|| FlopError::MissingTensor(STEP_TENSOR.into()))?,
        })
    }

    /// Write to a `.safetensors` file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    /// Read from a `.safetensors` file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}

/// Decode f32 bytes; the buffer need not be aligned.
fn read_f32(name: &str, dtype: Dtype, bytes: &[u8]) -> Result<Vec<f32>> {
    if dtype != Dtype::F32 {
        return Err(FlopError::Checkpoint(format!("{name} has dtype {dtype:?}, expected F32")));
    }
    if bytes.len() % std::mem::size_of::<f32>() != 0 {
        return Err(FlopError::Checkpoint(format!(
            "{name} holds {} bytes, not a whole number of f32 values",
            bytes.len()
        )));
    }
    Ok(bytemuck::pod_collect_to_vec::<u8, f32>(bytes))
}

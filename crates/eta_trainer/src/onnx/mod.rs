//! ONNX export of trained ensembles
//!
//! The graph is `input [N, 7] -> TreeEnsembleRegressor -> [N, 1] -> Squeeze
//! -> variable [N]`, at opset 12 with `ai.onnx.ml` opset 1. Leaf weights
//! already include shrinkage and the baseline is carried in `base_values`,
//! so runtimes reproduce `TreeEnsemble::predict_row` up to `f32` rounding.

pub mod proto;

use eta_core::{FeatureMeta, TreeEnsemble};
use prost::Message;
use std::path::Path;

use crate::errors::TrainerError;
use proto::{
    tensor_shape_proto::{dimension, Dimension},
    type_proto, AttributeProto, AttributeType, GraphProto, ModelProto, NodeProto,
    OperatorSetIdProto, StringStringEntryProto, TensorShapeProto, TypeProto, ValueInfoProto,
    TENSOR_FLOAT,
};

/// IR version matching opset 12
pub const IR_VERSION: i64 = 7;
pub const OPSET_VERSION: i64 = 12;
pub const ML_DOMAIN: &str = "ai.onnx.ml";
pub const ML_OPSET_VERSION: i64 = 1;

pub const INPUT_NAME: &str = "input";
pub const OUTPUT_NAME: &str = "variable";
const ENSEMBLE_OUTPUT: &str = "ensemble_output";
const BATCH_DIM: &str = "N";

pub const GRAPH_NAME: &str = "eta_duration";
pub const PRODUCER_NAME: &str = "eta-trainer";

/// Extra information recorded in the model's `metadata_props`
#[derive(Clone, Debug, Default)]
pub struct ExportInfo {
    pub loss: String,
    pub trained_at: String,
}

/// Flattened `TreeEnsembleRegressor` attributes.
///
/// Node ids restart at 0 for every tree and equal the node's position in
/// `Tree::nodes`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TreeEnsembleAttributes {
    pub nodes_treeids: Vec<i64>,
    pub nodes_nodeids: Vec<i64>,
    pub nodes_featureids: Vec<i64>,
    pub nodes_values: Vec<f32>,
    pub nodes_modes: Vec<String>,
    pub nodes_truenodeids: Vec<i64>,
    pub nodes_falsenodeids: Vec<i64>,
    pub nodes_missing_value_tracks_true: Vec<i64>,
    pub target_treeids: Vec<i64>,
    pub target_nodeids: Vec<i64>,
    pub target_ids: Vec<i64>,
    pub target_weights: Vec<f32>,
    pub base_value: f32,
}

impl TreeEnsembleAttributes {
    pub fn from_model(model: &TreeEnsemble) -> Self {
        let mut attrs = Self {
            base_value: model.baseline as f32,
            ..Self::default()
        };

        for (tree_id, tree) in model.trees.iter().enumerate() {
            let tree_id = tree_id as i64;
            for (node_id, node) in tree.nodes.iter().enumerate() {
                let node_id = node_id as i64;
                attrs.nodes_treeids.push(tree_id);
                attrs.nodes_nodeids.push(node_id);
                attrs.nodes_missing_value_tracks_true.push(0);

                match node.leaf_value() {
                    Some(value) if node.is_leaf() => {
                        attrs.nodes_featureids.push(0);
                        attrs.nodes_values.push(0.0);
                        attrs.nodes_modes.push("LEAF".to_string());
                        attrs.nodes_truenodeids.push(0);
                        attrs.nodes_falsenodeids.push(0);

                        attrs.target_treeids.push(tree_id);
                        attrs.target_nodeids.push(node_id);
                        attrs.target_ids.push(0);
                        attrs.target_weights.push(value as f32);
                    }
                    _ => {
                        attrs.nodes_featureids.push(i64::from(node.feature_idx));
                        attrs.nodes_values.push(node.threshold);
                        attrs.nodes_modes.push("BRANCH_LEQ".to_string());
                        attrs.nodes_truenodeids.push(i64::from(node.left));
                        attrs.nodes_falsenodeids.push(i64::from(node.right));
                    }
                }
            }
        }

        attrs
    }

    /// Evaluate the flattened ensemble the way an ONNX runtime does
    pub fn evaluate(&self, features: &[f32]) -> f32 {
        // (tree, node) -> position in the node arrays
        let mut positions = std::collections::HashMap::new();
        for (pos, (&t, &n)) in self.nodes_treeids.iter().zip(&self.nodes_nodeids).enumerate() {
            positions.insert((t, n), pos);
        }
        let mut weights = std::collections::HashMap::new();
        for ((&t, &n), &w) in self
            .target_treeids
            .iter()
            .zip(&self.target_nodeids)
            .zip(&self.target_weights)
        {
            weights.insert((t, n), w);
        }

        let mut roots: Vec<i64> = self.nodes_treeids.clone();
        roots.dedup();

        let mut sum = self.base_value;
        for tree in roots {
            let mut node = 0i64;
            loop {
                let Some(&pos) = positions.get(&(tree, node)) else {
                    break;
                };
                if self.nodes_modes[pos] == "LEAF" {
                    sum += weights.get(&(tree, node)).copied().unwrap_or(0.0);
                    break;
                }
                let x = features[self.nodes_featureids[pos] as usize];
                node = if x <= self.nodes_values[pos] {
                    self.nodes_truenodeids[pos]
                } else {
                    self.nodes_falsenodeids[pos]
                };
            }
        }

        sum
    }

    fn into_node(self, n_targets: i64) -> NodeProto {
        NodeProto {
            input: vec![INPUT_NAME.to_string()],
            output: vec![ENSEMBLE_OUTPUT.to_string()],
            name: "TreeEnsembleRegressor".to_string(),
            op_type: "TreeEnsembleRegressor".to_string(),
            domain: ML_DOMAIN.to_string(),
            attribute: vec![
                string_attr("aggregate_function", "SUM"),
                floats_attr("base_values", vec![self.base_value]),
                int_attr("n_targets", n_targets),
                ints_attr("nodes_falsenodeids", self.nodes_falsenodeids),
                ints_attr("nodes_featureids", self.nodes_featureids),
                ints_attr(
                    "nodes_missing_value_tracks_true",
                    self.nodes_missing_value_tracks_true,
                ),
                strings_attr("nodes_modes", self.nodes_modes),
                ints_attr("nodes_nodeids", self.nodes_nodeids),
                ints_attr("nodes_treeids", self.nodes_treeids),
                ints_attr("nodes_truenodeids", self.nodes_truenodeids),
                floats_attr("nodes_values", self.nodes_values),
                string_attr("post_transform", "NONE"),
                ints_attr("target_ids", self.target_ids),
                ints_attr("target_nodeids", self.target_nodeids),
                ints_attr("target_treeids", self.target_treeids),
                floats_attr("target_weights", self.target_weights),
            ],
            doc_string: String::new(),
        }
    }
}

/// Build the ONNX model for a trained ensemble
pub fn export_onnx(
    model: &TreeEnsemble,
    meta: &FeatureMeta,
    info: &ExportInfo,
) -> Result<ModelProto, TrainerError> {
    model.validate()?;

    if model.trees.is_empty() {
        return Err(TrainerError::Export("model has no trees".into()));
    }
    if meta.names.len() != model.n_features {
        return Err(TrainerError::Export(format!(
            "metadata lists {} features but the model expects {}",
            meta.names.len(),
            model.n_features
        )));
    }

    let ensemble = TreeEnsembleAttributes::from_model(model).into_node(1);

    let squeeze = NodeProto {
        input: vec![ENSEMBLE_OUTPUT.to_string()],
        output: vec![OUTPUT_NAME.to_string()],
        name: "Squeeze".to_string(),
        op_type: "Squeeze".to_string(),
        domain: String::new(),
        attribute: vec![ints_attr("axes", vec![1])],
        doc_string: String::new(),
    };

    let graph = GraphProto {
        node: vec![ensemble, squeeze],
        name: GRAPH_NAME.to_string(),
        doc_string: String::new(),
        input: vec![float_tensor_info(
            INPUT_NAME,
            &[
                dim_param(BATCH_DIM),
                dim_value(model.n_features as i64),
            ],
        )],
        output: vec![float_tensor_info(OUTPUT_NAME, &[dim_param(BATCH_DIM)])],
    };

    let mut metadata_props = vec![
        entry("feature_names", meta.names.join(",")),
        entry("loss", info.loss.clone()),
        entry("trained_at", info.trained_at.clone()),
    ];
    if let Some(scale) = &meta.price_scale {
        metadata_props.push(entry("precio_mean", scale.mean.to_string()));
        metadata_props.push(entry("precio_std", scale.std.to_string()));
    }

    Ok(ModelProto {
        ir_version: IR_VERSION,
        opset_import: vec![
            OperatorSetIdProto {
                domain: String::new(),
                version: OPSET_VERSION,
            },
            OperatorSetIdProto {
                domain: ML_DOMAIN.to_string(),
                version: ML_OPSET_VERSION,
            },
        ],
        producer_name: PRODUCER_NAME.to_string(),
        producer_version: crate::VERSION.to_string(),
        domain: String::new(),
        model_version: 1,
        doc_string: "Order duration regressor (seconds)".to_string(),
        graph: Some(graph),
        metadata_props,
    })
}

/// Serialize and write an ONNX model, returning the encoded bytes
pub fn write_onnx<P: AsRef<Path>>(path: P, model: &ModelProto) -> Result<Vec<u8>, TrainerError> {
    let bytes = model.encode_to_vec();
    std::fs::write(path, &bytes)?;
    Ok(bytes)
}

pub fn read_onnx<P: AsRef<Path>>(path: P) -> Result<ModelProto, TrainerError> {
    let bytes = std::fs::read(path)?;
    Ok(ModelProto::decode(bytes.as_slice())?)
}

/// Declared dimensions of a graph value: `Some(n)` for fixed, `None` for symbolic
pub fn value_dims(info: &ValueInfoProto) -> Vec<Option<i64>> {
    let Some(TypeProto {
        value: Some(type_proto::Value::TensorType(tensor)),
        ..
    }) = &info.r#type
    else {
        return Vec::new();
    };

    tensor
        .shape
        .as_ref()
        .map(|shape| {
            shape
                .dim
                .iter()
                .map(|d| match d.value {
                    Some(dimension::Value::DimValue(v)) => Some(v),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default()
}

fn float_tensor_info(name: &str, dims: &[Dimension]) -> ValueInfoProto {
    ValueInfoProto {
        name: name.to_string(),
        r#type: Some(TypeProto {
            denotation: String::new(),
            value: Some(type_proto::Value::TensorType(type_proto::Tensor {
                elem_type: TENSOR_FLOAT,
                shape: Some(TensorShapeProto { dim: dims.to_vec() }),
            })),
        }),
        doc_string: String::new(),
    }
}

fn dim_value(v: i64) -> Dimension {
    Dimension {
        denotation: String::new(),
        value: Some(dimension::Value::DimValue(v)),
    }
}

fn dim_param(name: &str) -> Dimension {
    Dimension {
        denotation: String::new(),
        value: Some(dimension::Value::DimParam(name.to_string())),
    }
}

fn entry(key: &str, value: String) -> StringStringEntryProto {
    StringStringEntryProto {
        key: key.to_string(),
        value,
    }
}

fn attribute(name: &str, kind: AttributeType) -> AttributeProto {
    AttributeProto {
        name: name.to_string(),
        r#type: kind as i32,
        ..AttributeProto::default()
    }
}

fn int_attr(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        i: value,
        ..attribute(name, AttributeType::Int)
    }
}

fn ints_attr(name: &str, values: Vec<i64>) -> AttributeProto {
    AttributeProto {
        ints: values,
        ..attribute(name, AttributeType::Ints)
    }
}

fn floats_attr(name: &str, values: Vec<f32>) -> AttributeProto {
    AttributeProto {
        floats: values,
        ..attribute(name, AttributeType::Floats)
    }
}

fn string_attr(name: &str, value: &str) -> AttributeProto {
    AttributeProto {
        s: value.as_bytes().to_vec(),
        ..attribute(name, AttributeType::String)
    }
}

fn strings_attr(name: &str, values: Vec<String>) -> AttributeProto {
    AttributeProto {
        strings: values.into_iter().map(String::into_bytes).collect(),
        ..attribute(name, AttributeType::Strings)
    }
}

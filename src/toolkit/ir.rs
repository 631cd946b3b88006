//! Serialization of a traced model into the toolkit's XML graph format (IR v11).
//!
//! The graph is a plain chain. Layer ids are assigned in emission order and every
//! layer numbers its ports inputs first, then outputs. Constant data lives in a
//! separate little-endian weights blob referenced by `offset`/`size`; every
//! constant starts on a 4-byte boundary.

use crate::model::{ConvLayer, LayerWeights, TracedModel};
use crate::toolkit::errors::{ToolkitError, ToolkitResult};
use half::f16;
use std::fmt::{self, Write};

const BLOB_ALIGN: usize = 4;

/// XML graph plus the weights blob it references.
#[derive(Debug, Clone, PartialEq)]
pub struct IrPackage {
    pub xml: String,
    pub weights: Vec<u8>,
}

#[derive(Clone, Copy)]
enum ElementType {
    F16,
    I8,
}

impl ElementType {
    fn name(self) -> &'static str {
        match self {
            ElementType::F16 => "f16",
            ElementType::I8 => "i8",
        }
    }

    fn precision(self) -> &'static str {
        match self {
            ElementType::F16 => "FP16",
            ElementType::I8 => "I8",
        }
    }
}

/// Output port of an emitted layer.
#[derive(Clone, Copy)]
struct PortRef {
    layer: usize,
    port: usize,
}

pub struct IrWriter<'a> {
    model: &'a TracedModel,
    layers: String,
    edges: Vec<(PortRef, PortRef)>,
    weights: Vec<u8>,
    next_id: usize,
}

impl<'a> IrWriter<'a> {
    pub fn new(model: &'a TracedModel) -> Self {
        Self {
            model,
            layers: String::new(),
            edges: Vec::new(),
            weights: Vec::new(),
            next_id: 0,
        }
    }

    pub fn serialize(mut self) -> ToolkitResult<IrPackage> {
        if self.model.layers.is_empty() {
            return Err(ToolkitError::InvalidModel {
                message: "model has no layers".to_string(),
            });
        }
        self.write_graph().map_err(|e| ToolkitError::InvalidModel {
            message: e.to_string(),
        })?;

        let xml = self.document().map_err(|e| ToolkitError::InvalidModel {
            message: e.to_string(),
        })?;

        Ok(IrPackage {
            xml,
            weights: self.weights,
        })
    }

    fn document(&self) -> Result<String, fmt::Error> {
        let mut xml = String::with_capacity(self.layers.len() + 96 * self.edges.len() + 128);
        writeln!(xml, "<?xml version=\"1.0\"?>")?;
        writeln!(xml, "<net name=\"conv_stack\" version=\"11\">")?;
        writeln!(xml, "\t<layers>")?;
        xml.push_str(&self.layers);
        writeln!(xml, "\t</layers>")?;
        writeln!(xml, "\t<edges>")?;
        for (from, to) in &self.edges {
            writeln!(
                xml,
                "\t\t<edge from-layer=\"{}\" from-port=\"{}\" to-layer=\"{}\" to-port=\"{}\" />",
                from.layer, from.port, to.layer, to.port
            )?;
        }
        writeln!(xml, "\t</edges>")?;
        writeln!(xml, "</net>")?;
        Ok(xml)
    }

    fn write_graph(&mut self) -> fmt::Result {
        let spec = self.model.spec;
        let activation_shape = spec.input_shape();
        let model = self.model;

        let mut current = self.parameter(&activation_shape)?;
        for (index, layer) in model.layers.iter().enumerate() {
            let kernel = self.layer_weights(index, layer)?;
            current = self.convolution(
                index,
                current,
                kernel,
                &activation_shape,
                &layer.shape,
                spec.padding(),
            )?;
            current = self.activation(index, current, &activation_shape)?;
        }
        self.result(current, &activation_shape)
    }

    fn take_id(&mut self) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn connect(&mut self, from: PortRef, layer: usize, port: usize) {
        self.edges.push((from, PortRef { layer, port }));
    }

    /// Appends a constant at the next 4-byte boundary.
    fn append_blob(&mut self, bytes: &[u8]) -> (usize, usize) {
        let offset = self.weights.len().next_multiple_of(BLOB_ALIGN);
        self.weights.resize(offset, 0);
        self.weights.extend_from_slice(bytes);
        (offset, bytes.len())
    }

    fn parameter(&mut self, shape: &[usize]) -> Result<PortRef, fmt::Error> {
        let id = self.take_id();
        let out = &mut self.layers;
        writeln!(out, "\t\t<layer id=\"{}\" name=\"input\" type=\"Parameter\" version=\"opset1\">", id)?;
        writeln!(out, "\t\t\t<data shape=\"{}\" element_type=\"f16\" />", join(shape))?;
        writeln!(out, "\t\t\t<output>")?;
        port(out, 0, ElementType::F16, shape, Some("input"))?;
        writeln!(out, "\t\t\t</output>")?;
        writeln!(out, "\t\t</layer>")?;
        Ok(PortRef { layer: id, port: 0 })
    }

    fn constant(&mut self, name: &str, element: ElementType, shape: &[usize], bytes: &[u8]) -> Result<PortRef, fmt::Error> {
        let id = self.take_id();
        let (offset, size) = self.append_blob(bytes);
        let out = &mut self.layers;
        writeln!(out, "\t\t<layer id=\"{}\" name=\"{}\" type=\"Const\" version=\"opset1\">", id, name)?;
        writeln!(
            out,
            "\t\t\t<data element_type=\"{}\" shape=\"{}\" offset=\"{}\" size=\"{}\" />",
            element.name(),
            join(shape),
            offset,
            size
        )?;
        writeln!(out, "\t\t\t<output>")?;
        port(out, 0, element, shape, None)?;
        writeln!(out, "\t\t\t</output>")?;
        writeln!(out, "\t\t</layer>")?;
        Ok(PortRef { layer: id, port: 0 })
    }

    /// FP16 kernel for one convolution, dequantized in-graph when stored as INT8.
    fn layer_weights(&mut self, index: usize, layer: &ConvLayer) -> Result<PortRef, fmt::Error> {
        match &layer.weights {
            LayerWeights::Float(values) => self.constant(
                &format!("conv{}.weight", index),
                ElementType::F16,
                &layer.shape,
                bytemuck::cast_slice(values),
            ),
            LayerWeights::Quantized(tensor) => {
                let values = self.constant(
                    &format!("conv{}.weight_int8", index),
                    ElementType::I8,
                    &layer.shape,
                    bytemuck::cast_slice(&tensor.values),
                )?;
                let converted = self.convert(index, values, &layer.shape)?;
                let scales: Vec<f16> = tensor.scales.iter().map(|&s| f16::from_f32(s)).collect();
                let scale_shape = [tensor.channels, 1, 1, 1];
                let scales = self.constant(
                    &format!("conv{}.weight_scale", index),
                    ElementType::F16,
                    &scale_shape,
                    bytemuck::cast_slice(&scales),
                )?;
                self.multiply(index, converted, scales, &layer.shape, &scale_shape)
            }
        }
    }

    fn convert(&mut self, index: usize, input: PortRef, shape: &[usize]) -> Result<PortRef, fmt::Error> {
        let id = self.take_id();
        self.connect(input, id, 0);
        let out = &mut self.layers;
        writeln!(out, "\t\t<layer id=\"{}\" name=\"conv{}.weight_convert\" type=\"Convert\" version=\"opset1\">", id, index)?;
        writeln!(out, "\t\t\t<data destination_type=\"f16\" />")?;
        writeln!(out, "\t\t\t<input>")?;
        port(out, 0, ElementType::I8, shape, None)?;
        writeln!(out, "\t\t\t</input>")?;
        writeln!(out, "\t\t\t<output>")?;
        port(out, 1, ElementType::F16, shape, None)?;
        writeln!(out, "\t\t\t</output>")?;
        writeln!(out, "\t\t</layer>")?;
        Ok(PortRef { layer: id, port: 1 })
    }

    fn multiply(
        &mut self,
        index: usize,
        values: PortRef,
        scales: PortRef,
        shape: &[usize],
        scale_shape: &[usize],
    ) -> Result<PortRef, fmt::Error> {
        let id = self.take_id();
        self.connect(values, id, 0);
        self.connect(scales, id, 1);
        let out = &mut self.layers;
        writeln!(out, "\t\t<layer id=\"{}\" name=\"conv{}.weight_dequantize\" type=\"Multiply\" version=\"opset1\">", id, index)?;
        writeln!(out, "\t\t\t<data auto_broadcast=\"numpy\" />")?;
        writeln!(out, "\t\t\t<input>")?;
        port(out, 0, ElementType::F16, shape, None)?;
        port(out, 1, ElementType::F16, scale_shape, None)?;
        writeln!(out, "\t\t\t</input>")?;
        writeln!(out, "\t\t\t<output>")?;
        port(out, 2, ElementType::F16, shape, None)?;
        writeln!(out, "\t\t\t</output>")?;
        writeln!(out, "\t\t</layer>")?;
        Ok(PortRef { layer: id, port: 2 })
    }

    fn convolution(
        &mut self,
        index: usize,
        input: PortRef,
        kernel: PortRef,
        shape: &[usize],
        kernel_shape: &[usize],
        padding: usize,
    ) -> Result<PortRef, fmt::Error> {
        let id = self.take_id();
        self.connect(input, id, 0);
        self.connect(kernel, id, 1);
        let out = &mut self.layers;
        writeln!(out, "\t\t<layer id=\"{}\" name=\"conv{}\" type=\"Convolution\" version=\"opset1\">", id, index)?;
        writeln!(
            out,
            "\t\t\t<data strides=\"1,1\" dilations=\"1,1\" pads_begin=\"{p},{p}\" pads_end=\"{p},{p}\" auto_pad=\"explicit\" />",
            p = padding
        )?;
        writeln!(out, "\t\t\t<input>")?;
        port(out, 0, ElementType::F16, shape, None)?;
        port(out, 1, ElementType::F16, kernel_shape, None)?;
        writeln!(out, "\t\t\t</input>")?;
        writeln!(out, "\t\t\t<output>")?;
        port(out, 2, ElementType::F16, shape, None)?;
        writeln!(out, "\t\t\t</output>")?;
        writeln!(out, "\t\t</layer>")?;
        Ok(PortRef { layer: id, port: 2 })
    }

    fn activation(&mut self, index: usize, input: PortRef, shape: &[usize]) -> Result<PortRef, fmt::Error> {
        let (op, version) = self.model.spec.activation.graph_op();
        let id = self.take_id();
        self.connect(input, id, 0);
        let out = &mut self.layers;
        writeln!(
            out,
            "\t\t<layer id=\"{}\" name=\"act{}\" type=\"{}\" version=\"{}\">",
            id, index, op, version
        )?;
        writeln!(out, "\t\t\t<input>")?;
        port(out, 0, ElementType::F16, shape, None)?;
        writeln!(out, "\t\t\t</input>")?;
        writeln!(out, "\t\t\t<output>")?;
        port(out, 1, ElementType::F16, shape, None)?;
        writeln!(out, "\t\t\t</output>")?;
        writeln!(out, "\t\t</layer>")?;
        Ok(PortRef { layer: id, port: 1 })
    }

    fn result(&mut self, input: PortRef, shape: &[usize]) -> fmt::Result {
        let id = self.take_id();
        self.connect(input, id, 0);
        let out = &mut self.layers;
        writeln!(out, "\t\t<layer id=\"{}\" name=\"output\" type=\"Result\" version=\"opset1\">", id)?;
        writeln!(out, "\t\t\t<input>")?;
        port(out, 0, ElementType::F16, shape, None)?;
        writeln!(out, "\t\t\t</input>")?;
        writeln!(out, "\t\t</layer>")
    }
}

fn port(out: &mut String, id: usize, element: ElementType, shape: &[usize], names: Option<&str>) -> fmt::Result {
    match names {
        Some(names) => writeln!(
            out,
            "\t\t\t\t<port id=\"{}\" precision=\"{}\" names=\"{}\">",
            id,
            element.precision(),
            names
        )?,
        None => writeln!(out, "\t\t\t\t<port id=\"{}\" precision=\"{}\">", id, element.precision())?,
    }
    for dim in shape {
        writeln!(out, "\t\t\t\t\t<dim>{}</dim>", dim)?;
    }
    writeln!(out, "\t\t\t\t</port>")
}

fn join(shape: &[usize]) -> String {
    shape
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

//! Object to [`ObjectValue`] conversion.
//!
//! The plain converter copies public fields recursively. The masking
//! converter additionally applies each field's [`MaskAttribute`] in the same
//! pass, reusing one masker per strategy for the whole conversion.

use ml_common::{
    LogObject, LogRecord, Map, MaskAttribute, MaskerKind, ObjectValue, Processor, Result, Value,
};

use crate::masker::{masker_for, Masker};

/// Converts objects into their field maps.
pub struct ObjectConverter {
    masked: bool,
    maskers: Vec<(MaskerKind, Box<dyn Masker>)>,
}

impl ObjectConverter {
    /// Converter ignoring mask annotations.
    pub fn plain() -> Self {
        ObjectConverter {
            masked: false,
            maskers: Vec::new(),
        }
    }

    /// Converter applying mask annotations while it converts.
    pub fn masked() -> Self {
        ObjectConverter {
            masked: true,
            maskers: Vec::new(),
        }
    }

    pub fn convert(&mut self, object: &dyn LogObject) -> ObjectValue {
        let attributes: &[MaskAttribute] = if self.masked {
            object.mask_attributes()
        } else {
            &[]
        };
        let mut fields = Map::new();
        for (name, value) in object.fields() {
            let mut converted = self.convert_value(value);
            let annotation = attributes
                .iter()
                .find(|attr| name.as_str() == Some(attr.field));
            if let Some(attr) = annotation {
                converted = self.masker(attr.masker).add_mask(None, converted);
            }
            fields.insert(name, converted);
        }
        ObjectValue {
            type_name: object.type_name().map(str::to_string),
            fields,
        }
    }

    /// Convert every object reachable from `value`.
    pub fn convert_value(&mut self, value: Value) -> Value {
        match value {
            Value::Raw(raw) => Value::Object(self.convert(raw.object())),
            Value::Seq(items) => {
                Value::Seq(items.into_iter().map(|v| self.convert_value(v)).collect())
            }
            Value::Map(map) => Value::Map(self.convert_map(map)),
            Value::Object(mut obj) => {
                obj.fields = self.convert_map(obj.fields);
                Value::Object(obj)
            }
            scalar => scalar,
        }
    }

    pub fn convert_map(&mut self, map: Map) -> Map {
        map.into_iter()
            .map(|(k, v)| (k, self.convert_value(v)))
            .collect()
    }

    fn masker(&mut self, kind: MaskerKind) -> &dyn Masker {
        let index = match self.maskers.iter().position(|(k, _)| *k == kind) {
            Some(index) => index,
            None => {
                self.maskers.push((kind, masker_for(kind)));
                self.maskers.len() - 1
            }
        };
        self.maskers[index].1.as_ref()
    }
}

/// Converts objects found in the context before handlers see them.
#[derive(Debug, Clone, Copy)]
pub struct ObjectConverterProcessor {
    masked: bool,
}

impl ObjectConverterProcessor {
    pub fn plain() -> Self {
        ObjectConverterProcessor { masked: false }
    }

    /// Variant honouring field mask annotations.
    pub fn masked() -> Self {
        ObjectConverterProcessor { masked: true }
    }

    pub fn is_masked(&self) -> bool {
        self.masked
    }

    /// Convert a context outside of a pipeline.
    pub fn convert_context(&self, context: Map) -> Map {
        let mut converter = if self.masked {
            ObjectConverter::masked()
        } else {
            ObjectConverter::plain()
        };
        converter.convert_map(context)
    }
}

impl Processor for ObjectConverterProcessor {
    fn process(&self, record: LogRecord) -> Result<LogRecord> {
        if record.context.is_empty() {
            return Ok(record);
        }
        let context = self.convert_context(record.context.clone());
        Ok(record.with_context(context))
    }

    fn name(&self) -> &str {
        if self.masked {
            "MaskedObjectConverterProcessor"
        } else {
            "ObjectConverterProcessor"
        }
    }
}

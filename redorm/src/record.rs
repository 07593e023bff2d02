use crate::auto_field::PRIMARY_KEY;
use crate::codec::CodecRegistry;
use crate::error::AppError;
use crate::header::FieldTypeMapping;
use crate::value::Value;
use serde_json::{Map, Value as Json};

/// Converts between field values and the stored JSON object of codec strings.
pub struct RecordCodec<'a> {
    field_types: &'a FieldTypeMapping,
    codecs: &'a CodecRegistry,
}

impl<'a> RecordCodec<'a> {
    pub fn new(field_types: &'a FieldTypeMapping, codecs: &'a CodecRegistry) -> Self {
        RecordCodec { field_types, codecs }
    }

    pub fn encode(&self, id: &str, fields: &[(String, Value)]) -> Result<Vec<u8>, AppError> {
        let mut map = Map::with_capacity(fields.len() + 1);
        for (name, value) in fields.iter().filter(|(name, _)| name != PRIMARY_KEY) {
            let tag = self.field_types.get(name).ok_or_else(|| AppError::UnknownField(name.clone()))?;
            map.insert(name.clone(), Json::String(self.codecs.serialize(tag, value)?));
        }
        map.insert(PRIMARY_KEY.to_string(), Json::String(id.to_string()));
        Ok(serde_json::to_vec(&map)?)
    }

    /// Decodes every stored entry, identity included.
    pub fn decode(&self, bytes: &[u8]) -> Result<Vec<(String, Value)>, AppError> {
        let map: Map<String, Json> = serde_json::from_slice(bytes)?;
        map.into_iter()
            .map(|(name, raw)| {
                let tag = self.field_types.get(&name).ok_or_else(|| AppError::UnknownField(name.clone()))?;
                match raw {
                    Json::String(text) => Ok((name, self.codecs.deserialize(tag, &text)?)),
                    other => Err(AppError::Codec(format!("record entry {name} holds {other}, expected a string"))),
                }
            })
            .collect()
    }
}

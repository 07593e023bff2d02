use crate::error::AppError;
use crate::schema::ModelSchema;
use crate::storage::KvHandle;
use crate::value::TypeTag;
use crate::{debug, error, info};
use serde_json::{Map, Value as Json};

/// Reserved key holding the schema header; never a record id.
pub const DATABASE_HEADER_NAME: &str = "__database_headers__";

/// Field name to type, in declaration order with the identity last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldTypeMapping(Vec<(String, TypeTag)>);

impl FieldTypeMapping {
    pub fn new(entries: Vec<(String, TypeTag)>) -> Self {
        FieldTypeMapping(entries)
    }

    pub fn get(&self, name: &str) -> Option<TypeTag> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, tag)| *tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compact JSON object, e.g. `{"ids":"int","name":"str","id":"str"}`.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AppError> {
        let map: Map<String, Json> =
            self.0.iter().map(|(name, tag)| (name.clone(), Json::String(tag.type_name().to_string()))).collect();
        Ok(serde_json::to_vec(&map)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AppError> {
        let map: Map<String, Json> = serde_json::from_slice(bytes)?;
        let entries = map
            .into_iter()
            .map(|(name, tag)| match tag {
                Json::String(type_name) => Ok((name, type_name.parse::<TypeTag>()?)),
                other => Err(AppError::Codec(format!("header entry {name} holds {other}, expected a type name"))),
            })
            .collect::<Result<Vec<_>, AppError>>()?;
        Ok(FieldTypeMapping(entries))
    }
}

impl From<&ModelSchema> for FieldTypeMapping {
    fn from(schema: &ModelSchema) -> Self {
        FieldTypeMapping(schema.field_types())
    }
}

/// Writes the header on first use, otherwise checks the stored one byte for byte.
pub fn reconcile(schema: &ModelSchema, handle: &mut dyn KvHandle) -> Result<FieldTypeMapping, AppError> {
    let mapping = FieldTypeMapping::from(schema);
    let computed = mapping.to_bytes()?;
    match handle.get(DATABASE_HEADER_NAME)? {
        None => {
            handle.set(DATABASE_HEADER_NAME, &computed)?;
            info!("Wrote header for {} : {}", schema.table_name(), String::from_utf8_lossy(&computed));
            Ok(mapping)
        }
        Some(stored) if stored == computed => {
            debug!("Header of {} verified", schema.table_name());
            Ok(mapping)
        }
        Some(stored) => {
            let stored = String::from_utf8_lossy(&stored).into_owned();
            let computed = String::from_utf8_lossy(&computed).into_owned();
            error!("Header mismatch for {} : stored {} computed {}", schema.table_name(), stored, computed);
            Err(AppError::SchemaMismatch { stored, computed })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ModelDeclaration;
    use crate::storage::{with_handle, MemoryStore};

    fn account(name_tag: TypeTag) -> ModelSchema {
        ModelDeclaration::new("Account").field("ids", TypeTag::Int).field("name", name_tag).build().unwrap()
    }

    #[test]
    fn header_is_compact_json_in_declaration_order() {
        let mapping = FieldTypeMapping::from(&account(TypeTag::Str));
        assert_eq!(String::from_utf8(mapping.to_bytes().unwrap()).unwrap(), r#"{"ids":"int","name":"str","id":"str"}"#);
        assert_eq!(FieldTypeMapping::from_bytes(&mapping.to_bytes().unwrap()).unwrap(), mapping);
        assert_eq!(mapping.get("id"), Some(TypeTag::Str));
        assert_eq!(mapping.len(), 3);
    }

    #[test]
    fn first_bind_writes_and_later_binds_verify() {
        let store = MemoryStore::new("accounts");
        let schema = account(TypeTag::Str);
        with_handle(&store, |h| reconcile(&schema, h)).unwrap();
        let stored = with_handle(&store, |h| h.get(DATABASE_HEADER_NAME)).unwrap().unwrap();
        with_handle(&store, |h| reconcile(&schema, h)).unwrap();
        let again = with_handle(&store, |h| h.get(DATABASE_HEADER_NAME)).unwrap().unwrap();
        assert_eq!(stored, again);
    }

    #[test]
    fn changed_schema_is_a_mismatch() {
        let store = MemoryStore::new("accounts");
        with_handle(&store, |h| reconcile(&account(TypeTag::Str), h)).unwrap();
        let err = with_handle(&store, |h| reconcile(&account(TypeTag::Bytes), h)).unwrap_err();
        match err {
            AppError::SchemaMismatch { stored, computed } => {
                assert_eq!(stored, r#"{"ids":"int","name":"str","id":"str"}"#);
                assert_eq!(computed, r#"{"ids":"int","name":"bytes","id":"str"}"#);
            }
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn unknown_type_names_fail_to_parse() {
        let err = FieldTypeMapping::from_bytes(br#"{"a":"complex"}"#).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedType(ref t) if t == "complex"));
    }
}

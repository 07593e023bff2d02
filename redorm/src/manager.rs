use crate::auto_field::PRIMARY_KEY;
use crate::codec::{CodecRegistry, BUILTIN_CODECS};
use crate::error::AppError;
use crate::header::{self, FieldTypeMapping, DATABASE_HEADER_NAME};
use crate::info;
use crate::model::Model;
use crate::record::RecordCodec;
use crate::schema::ModelSchema;
use crate::storage::{with_handle, KvStore};
use crate::value::Value;
use crate::Kwargs;
use std::fmt;
use std::sync::Arc;

/// Per-model gateway to the table's store. Cheap to clone; every operation opens and releases its own handle.
#[derive(Clone)]
pub struct RecordManager {
    schema: Arc<ModelSchema>,
    store: Arc<dyn KvStore>,
    codecs: Arc<CodecRegistry>,
    field_types: Arc<FieldTypeMapping>,
}

impl RecordManager {
    pub fn bind(schema: ModelSchema, store: impl KvStore + 'static) -> Result<Self, AppError> {
        RecordManager::bind_with(Arc::new(schema), Arc::new(store), Arc::clone(&BUILTIN_CODECS))
    }

    /// Checks that every declared type has a codec, then reconciles the schema header with the store.
    pub fn bind_with(schema: Arc<ModelSchema>, store: Arc<dyn KvStore>, codecs: Arc<CodecRegistry>) -> Result<Self, AppError> {
        for (_, tag) in schema.field_types() {
            codecs.get(tag)?;
        }
        let field_types = with_handle(store.as_ref(), |handle| header::reconcile(&schema, handle))?;
        Ok(RecordManager { schema, store, codecs, field_types: Arc::new(field_types) })
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub fn field_types(&self) -> &FieldTypeMapping {
        &self.field_types
    }

    pub fn location(&self) -> String {
        self.store.location()
    }

    fn record_codec(&self) -> RecordCodec<'_> {
        RecordCodec::new(&self.field_types, &self.codecs)
    }

    fn does_not_exist(&self, id: &str) -> AppError {
        AppError::DoesNotExist(format!("{} with id {} does not exists", self.schema.model_name(), id))
    }

    fn fetch(&self, id: &str) -> Result<Option<Kwargs>, AppError> {
        if id == DATABASE_HEADER_NAME {
            return Ok(None);
        }
        let bytes = with_handle(self.store.as_ref(), |handle| handle.get(id))?;
        bytes.map(|bytes| self.record_codec().decode(&bytes)).transpose()
    }

    /// Identity that a record with these values would get, after validating them.
    fn derive_id(&self, kwargs: Kwargs) -> Result<String, AppError> {
        let validated = kwargs
            .into_iter()
            .map(|(name, value)| {
                let field = self.schema.field(&name).ok_or_else(|| AppError::UnknownField(name.clone()))?;
                Ok((name, field.before_set(value)?))
            })
            .collect::<Result<Kwargs, AppError>>()?;
        Ok(self.schema.identity().bind(&validated).get_default_value())
    }

    /// Persists `fields` under `id`, overwriting any previous record.
    pub fn save(&self, id: &str, fields: &[(String, Value)]) -> Result<(), AppError> {
        if id == DATABASE_HEADER_NAME {
            return Err(AppError::ReservedField(id.to_string()));
        }
        let bytes = self.record_codec().encode(id, fields)?;
        with_handle(self.store.as_ref(), |handle| handle.set(id, &bytes))
    }

    pub fn create(&self, kwargs: Kwargs) -> Result<Model, AppError> {
        if kwargs.is_empty() {
            return Err(AppError::MissingFields);
        }
        let model = Model::new(self, kwargs)?;
        model.save()?;
        Ok(model)
    }

    pub fn get(&self, id: &str) -> Result<Model, AppError> {
        match self.fetch(id)? {
            Some(record) => Model::from_record(self, record),
            None => Err(self.does_not_exist(id)),
        }
    }

    /// Looks up by `id`, or by exactly the unique-together fields.
    pub fn get_by(&self, kwargs: Kwargs) -> Result<Model, AppError> {
        if let Some((_, id)) = kwargs.iter().find(|(name, _)| name == PRIMARY_KEY) {
            let id = self.schema.identity().materialize(id.clone())?;
            return self.get(&id);
        }
        if !self.schema.is_unique_together(kwargs.iter().map(|(name, _)| name.as_str())) {
            return Err(AppError::RiskOfReturningMultipleObjects(format!(
                "{} can only be looked up by id or by all of {:?}",
                self.schema.model_name(),
                self.schema.unique_together()
            )));
        }
        let described = kwargs.iter().map(|(name, value)| format!("'{}': {}", name, value.repr())).collect::<Vec<_>>().join(", ");
        let id = self.derive_id(kwargs)?;
        match self.fetch(&id)? {
            Some(stored) => Model::from_record(self, stored),
            None => Err(AppError::DoesNotExist(format!("{} with {{{}}} does not exists", self.schema.model_name(), described))),
        }
    }

    /// Merges `changed` into the stored record without running validators.
    pub fn update_unvalidated(&self, id: &str, changed: Kwargs) -> Result<(), AppError> {
        if changed.iter().any(|(name, _)| name == PRIMARY_KEY) {
            return Err(AppError::ReadOnlyField(PRIMARY_KEY.to_string()));
        }
        let stored = self.fetch(id)?.ok_or_else(|| self.does_not_exist(id))?;
        let mut fields: Kwargs = stored.into_iter().filter(|(name, _)| name != PRIMARY_KEY).collect();
        for (name, value) in changed {
            match fields.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = value,
                None => fields.push((name, value)),
            }
        }
        self.save(id, &fields)
    }

    pub fn delete(&self, id: &str) -> Result<(), AppError> {
        if id == DATABASE_HEADER_NAME {
            return Err(self.does_not_exist(id));
        }
        if with_handle(self.store.as_ref(), |handle| handle.delete(id))? {
            Ok(())
        } else {
            Err(self.does_not_exist(id))
        }
    }

    /// Record ids, header excluded.
    pub fn keys(&self) -> Result<Vec<String>, AppError> {
        let keys = with_handle(self.store.as_ref(), |handle| handle.keys())?;
        Ok(keys.into_iter().filter(|key| key != DATABASE_HEADER_NAME).collect())
    }

    pub fn contains(&self, id: &str) -> Result<bool, AppError> {
        if id == DATABASE_HEADER_NAME {
            return Ok(false);
        }
        with_handle(self.store.as_ref(), |handle| handle.contains(id))
    }

    /// Lazily materializes every record; ids are snapshotted up front.
    pub fn all(&self) -> Result<Records, AppError> {
        Ok(Records { objects: self.clone(), keys: self.keys()?.into_iter() })
    }

    /// Records whose fields equal every given value.
    pub fn filter(&self, constraints: Kwargs) -> Result<impl Iterator<Item = Result<Model, AppError>>, AppError> {
        if let Some((name, _)) = constraints.iter().find(|(name, _)| name != PRIMARY_KEY && self.schema.field(name).is_none()) {
            return Err(AppError::UnknownField(name.clone()));
        }
        Ok(self.all()?.filter(move |record| match record {
            Ok(model) => model.matches(&constraints),
            Err(_) => true,
        }))
    }

    pub fn count(&self) -> Result<usize, AppError> {
        Ok(self.keys()?.len())
    }

    pub fn len(&self) -> Result<usize, AppError> {
        self.count()
    }

    pub fn is_empty(&self) -> Result<bool, AppError> {
        Ok(self.count()? == 0)
    }

    /// By `id` when given, by derived identity for exactly the unique-together fields, else by scanning.
    pub fn exists(&self, kwargs: Kwargs) -> Result<bool, AppError> {
        let mut constraints = kwargs;
        if let Some(position) = constraints.iter().position(|(name, _)| name == PRIMARY_KEY) {
            let (_, id) = constraints.remove(position);
            let id = self.schema.identity().materialize(id)?;
            return self.contains(&id);
        }
        if self.schema.is_unique_together(constraints.iter().map(|(name, _)| name.as_str())) {
            let id = self.derive_id(constraints)?;
            return self.contains(&id);
        }
        match self.filter(constraints)?.next() {
            Some(record) => record.map(|_| true),
            None => Ok(false),
        }
    }

    /// Deletes the whole table, header included.
    pub fn destroy(self) -> Result<(), AppError> {
        self.store.destroy()?;
        info!("Removed store of {} at {}", self.schema.table_name(), self.store.location());
        Ok(())
    }
}

impl fmt::Debug for RecordManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordManager")
            .field("model", &self.schema.model_name())
            .field("location", &self.store.location())
            .field("field_types", &self.field_types)
            .finish()
    }
}

/// Iterator returned by [`RecordManager::all`].
pub struct Records {
    objects: RecordManager,
    keys: std::vec::IntoIter<String>,
}

impl Iterator for Records {
    type Item = Result<Model, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.keys.next()?;
            match self.objects.fetch(&key) {
                Ok(Some(record)) => return Some(Model::from_record(&self.objects, record)),
                Ok(None) => continue,
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kwargs;
    use crate::schema::ModelDeclaration;
    use crate::storage::MemoryStore;
    use crate::value::TypeTag;

    fn accounts() -> (RecordManager, MemoryStore) {
        let store = MemoryStore::new("accounts");
        let schema = ModelDeclaration::new("Account").field("ids", TypeTag::Int).field("name", TypeTag::Str).build().unwrap();
        (RecordManager::bind(schema, store.clone()).unwrap(), store)
    }

    #[test]
    fn create_get_and_delete() {
        let (objects, store) = accounts();
        let john = objects.create(kwargs! { "ids" => 1, "name" => "John" }).unwrap();
        assert_eq!(john.id(), "db6dede12578a5795f59d25ea68a8289");
        assert!(!store.is_open());

        let fetched = objects.get(john.id()).unwrap();
        assert_eq!(fetched, john);
        assert_eq!(objects.count().unwrap(), 1);
        assert_eq!(objects.keys().unwrap(), vec![john.id().to_string()]);

        objects.delete(john.id()).unwrap();
        assert_eq!(objects.count().unwrap(), 0);
        let err = objects.delete(john.id()).unwrap_err();
        assert_eq!(err.to_string(), "Account with id db6dede12578a5795f59d25ea68a8289 does not exists");
        assert!(matches!(objects.get("nope"), Err(AppError::DoesNotExist(_))));
    }

    #[test]
    fn create_requires_fields() {
        let (objects, _) = accounts();
        assert!(matches!(objects.create(Vec::new()), Err(AppError::MissingFields)));
    }

    #[test]
    fn header_key_is_not_a_record() {
        let (objects, _) = accounts();
        assert!(!objects.contains(DATABASE_HEADER_NAME).unwrap());
        assert!(matches!(objects.get(DATABASE_HEADER_NAME), Err(AppError::DoesNotExist(_))));
        assert!(matches!(objects.delete(DATABASE_HEADER_NAME), Err(AppError::DoesNotExist(_))));
        assert!(objects.is_empty().unwrap());
    }

    #[test]
    fn get_by_unique_together_or_id() {
        let (objects, _) = accounts();
        let john = objects.create(kwargs! { "ids" => 1, "name" => "John" }).unwrap();
        assert_eq!(objects.get_by(kwargs! { "name" => "John", "ids" => 1 }).unwrap(), john);
        assert_eq!(objects.get_by(kwargs! { "id" => john.id() }).unwrap(), john);
        let err = objects.get_by(kwargs! { "name" => "John" }).unwrap_err();
        assert!(matches!(err, AppError::RiskOfReturningMultipleObjects(_)), "{err}");
        let err = objects.get_by(kwargs! { "ids" => 2, "name" => "John" }).unwrap_err();
        assert_eq!(err.to_string(), "Account with {'ids': 2, 'name': 'John'} does not exists");
    }

    #[test]
    fn exists_uses_id_identity_or_scan() {
        let (objects, _) = accounts();
        let john = objects.create(kwargs! { "ids" => 1, "name" => "John" }).unwrap();
        assert!(objects.exists(kwargs! { "id" => john.id() }).unwrap());
        assert!(objects.exists(kwargs! { "ids" => 1, "name" => "John" }).unwrap());
        assert!(!objects.exists(kwargs! { "ids" => 2, "name" => "John" }).unwrap());
        assert!(objects.exists(kwargs! { "name" => "John" }).unwrap());
        assert!(!objects.exists(kwargs! { "name" => "Jane" }).unwrap());
        assert!(matches!(objects.exists(kwargs! { "age" => 3 }), Err(AppError::UnknownField(_))));
        let err = objects.exists(kwargs! { "ids" => "1", "name" => "John" }).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "{err}");
    }

    #[test]
    fn filter_matches_all_constraints() {
        let (objects, _) = accounts();
        objects.create(kwargs! { "ids" => 1, "name" => "John" }).unwrap();
        objects.create(kwargs! { "ids" => 2, "name" => "John" }).unwrap();
        objects.create(kwargs! { "ids" => 2, "name" => "Jane" }).unwrap();
        let johns = objects.filter(kwargs! { "name" => "John" }).unwrap().collect::<Result<Vec<_>, _>>().unwrap();
        assert_eq!(johns.len(), 2);
        let twos = objects.filter(kwargs! { "ids" => 2, "name" => "Jane" }).unwrap().count();
        assert_eq!(twos, 1);
        assert_eq!(objects.all().unwrap().count(), 3);
        assert_eq!(objects.filter(Vec::new()).unwrap().count(), 3);
    }

    #[test]
    fn raw_update_merges_without_validation() {
        let (objects, _) = accounts();
        let john = objects.create(kwargs! { "ids" => 1, "name" => "John" }).unwrap();
        objects.update_unvalidated(john.id(), kwargs! { "name" => "Johnny" }).unwrap();
        let fetched = objects.get(john.id()).unwrap();
        assert_eq!(fetched.get("name").unwrap(), Value::from("Johnny"));
        assert_eq!(fetched.get("ids").unwrap(), Value::Int(1));
        assert_eq!(fetched.id(), john.id());

        assert!(matches!(objects.update_unvalidated(john.id(), kwargs! { "id" => "x" }), Err(AppError::ReadOnlyField(_))));
        assert!(matches!(objects.update_unvalidated("nope", kwargs! { "name" => "x" }), Err(AppError::DoesNotExist(_))));
        assert!(matches!(objects.update_unvalidated(john.id(), kwargs! { "age" => 1 }), Err(AppError::UnknownField(_))));
        let err = objects.update_unvalidated(john.id(), kwargs! { "ids" => "one" }).unwrap_err();
        assert!(matches!(err, AppError::Codec(_)), "{err}");
    }

    #[test]
    fn missing_codec_fails_at_bind() {
        let schema = ModelDeclaration::new("Event").field("at", TypeTag::Date).build().unwrap();
        let mut codecs = CodecRegistry::empty();
        codecs.register(TypeTag::Str, |v| Ok(v.text()), |t| Ok(Value::from(t)));
        let err = RecordManager::bind_with(Arc::new(schema), Arc::new(MemoryStore::new("events")), Arc::new(codecs)).unwrap_err();
        assert_eq!(err.to_string(), "Type date is not supported yet!");
    }

    #[test]
    fn destroy_drops_records_and_header() {
        let (objects, store) = accounts();
        objects.create(kwargs! { "ids" => 1, "name" => "John" }).unwrap();
        objects.destroy().unwrap();
        assert!(with_handle(&store, |handle| handle.keys()).unwrap().is_empty());
    }
}

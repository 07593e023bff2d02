//! redorm maps declared models onto [Redb](https://github.com/cberner/redb) files, one file per table.
//!
//! A model is a named, ordered set of typed fields. Each field may carry a default, a default factory,
//! normalizers and validators. Every instance gets a derived `id`: the md5 of its unique-together values,
//! so saving the same logical record twice overwrites rather than duplicates.
//!
//! Records are stored as compact JSON objects of per-type codec strings. The first time a table is bound,
//! a schema header describing every field type is written under a reserved key; later binds compare
//! against it and refuse to touch a table whose layout changed.
//!
//! ```
//! use redorm::{kwargs, model, MemoryStore, RecordManager};
//!
//! let schema = model!(Account { ids: Int, name: Str }).build().unwrap();
//! let accounts = RecordManager::bind(schema, MemoryStore::new("accounts")).unwrap();
//! let john = accounts.create(kwargs! { "ids" => 1, "name" => "John" }).unwrap();
//! assert_eq!(john.id(), "db6dede12578a5795f59d25ea68a8289");
//! assert_eq!(john.to_string(), "Account(ids=1, name='John')");
//! assert_eq!(accounts.count().unwrap(), 1);
//! ```

pub mod auto_field;
pub mod codec;
pub mod error;
pub mod field;
pub mod header;
pub mod logger;
pub mod macros;
pub mod manager;
pub mod model;
pub mod record;
pub mod schema;
pub mod settings;
pub mod storage;
pub mod validator;
pub mod value;

pub use auto_field::{AutoField, PRIMARY_KEY};
pub use chrono;
pub use codec::{Codec, CodecRegistry, BUILTIN_CODECS};
pub use error::{AppError, ValidationError, ValueMismatch};
pub use field::{BoundField, Field};
pub use header::{FieldTypeMapping, DATABASE_HEADER_NAME};
pub use manager::{RecordManager, Records};
pub use model::Model;
pub use redb;
pub use schema::{ModelConfig, ModelDeclaration, ModelSchema};
pub use settings::{Settings, StorageSettings};
pub use storage::{KvHandle, KvStore, MemoryStore, RedbStore};
pub use validator::{Validator, ValidatorRegistry};
pub use value::{TypeTag, Value};

/// Keyword arguments: field name to value, in the order given.
pub type Kwargs = Vec<(String, Value)>;

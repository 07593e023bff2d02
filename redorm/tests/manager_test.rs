use redorm::storage::with_handle;
use redorm::{kwargs, model, AppError, KvStore, RecordManager, StorageSettings, Value, DATABASE_HEADER_NAME};
use std::collections::HashSet;

fn people(storage: &StorageSettings) -> RecordManager {
    storage.bind(model!(Person { name: Str, city: Str, age: Int }).unique_together(["name", "city"]).build().unwrap()).unwrap()
}

#[test]
fn all_and_filter_skip_the_header() {
    let storage = StorageSettings::temp("people");
    let people = people(&storage);
    people.create(kwargs! { "name" => "Ada", "city" => "London", "age" => 36 }).unwrap();
    people.create(kwargs! { "name" => "Alan", "city" => "London", "age" => 41 }).unwrap();
    people.create(kwargs! { "name" => "Grace", "city" => "Arlington", "age" => 85 }).unwrap();

    let names: HashSet<String> = people
        .all()
        .unwrap()
        .map(|person| person.unwrap().get("name").unwrap().as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, HashSet::from(["Ada".to_string(), "Alan".to_string(), "Grace".to_string()]));

    let londoners = people.filter(kwargs! { "city" => "London" }).unwrap().count();
    assert_eq!(londoners, 2);
    let ada = people.filter(kwargs! { "city" => "London", "age" => 36 }).unwrap().next().unwrap().unwrap();
    assert_eq!(ada.get("name").unwrap(), Value::from("Ada"));
    assert_eq!(people.filter(kwargs! { "age" => 99 }).unwrap().count(), 0);

    let store = storage.store_for("persons").unwrap();
    let raw_keys = with_handle(&store, |handle| handle.keys()).unwrap();
    assert_eq!(raw_keys.len(), 4);
    assert!(raw_keys.iter().any(|key| key == DATABASE_HEADER_NAME));
    assert_eq!(people.keys().unwrap().len(), 3);
    people.destroy().unwrap();
}

#[test]
fn exists_by_id_by_identity_and_by_scan() {
    let storage = StorageSettings::temp("exists");
    let people = people(&storage);
    let ada = people.create(kwargs! { "name" => "Ada", "city" => "London", "age" => 36 }).unwrap();

    assert!(people.exists(kwargs! { "id" => ada.id() }).unwrap());
    assert!(people.exists(kwargs! { "city" => "London", "name" => "Ada" }).unwrap());
    assert!(!people.exists(kwargs! { "city" => "Paris", "name" => "Ada" }).unwrap());
    assert!(people.exists(kwargs! { "age" => 36 }).unwrap());
    assert!(!people.exists(kwargs! { "age" => 37 }).unwrap());

    assert_eq!(people.get_by(kwargs! { "name" => "Ada", "city" => "London" }).unwrap(), ada);
    let err = people.get_by(kwargs! { "name" => "Ada" }).unwrap_err();
    assert!(matches!(err, AppError::RiskOfReturningMultipleObjects(_)), "{err}");
    people.destroy().unwrap();
}

#[test]
fn raw_update_skips_validation_but_not_codecs() {
    let storage = StorageSettings::temp("raw");
    let people = people(&storage);
    let ada = people.create(kwargs! { "name" => "Ada", "city" => "London", "age" => 36 }).unwrap();

    people.update_unvalidated(ada.id(), kwargs! { "age" => 37 }).unwrap();
    let fetched = people.get(ada.id()).unwrap();
    assert_eq!(fetched.get("age").unwrap(), Value::Int(37));
    assert_eq!(fetched.get("city").unwrap(), Value::from("London"));

    let err = people.update_unvalidated(ada.id(), kwargs! { "age" => "old" }).unwrap_err();
    assert!(matches!(err, AppError::Codec(_)), "{err}");
    assert_eq!(people.get(ada.id()).unwrap().get("age").unwrap(), Value::Int(37));
    people.destroy().unwrap();
}

#[test]
fn operations_release_the_store_between_calls() {
    let storage = StorageSettings::temp("release");
    let people = people(&storage);
    people.create(kwargs! { "name" => "Ada", "city" => "London", "age" => 36 }).unwrap();

    let store = storage.store_for("persons").unwrap();
    let handle = store.open().unwrap();
    let err = people.count().unwrap_err();
    assert!(matches!(err, AppError::Database(_)), "{err}");
    handle.close().unwrap();

    assert_eq!(people.count().unwrap(), 1);
    let err = people.create(kwargs! { "name" => "Ada", "city" => "London", "age" => "x" }).unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(people.count().unwrap(), 1);
    people.destroy().unwrap();
}

#[test]
fn second_binding_shares_the_file() {
    let storage = StorageSettings::temp("shared");
    let writer = people(&storage);
    let reader = people(&storage);
    let ada = writer.create(kwargs! { "name" => "Ada", "city" => "London", "age" => 36 }).unwrap();
    assert_eq!(reader.get(ada.id()).unwrap(), ada);
    reader.delete(ada.id()).unwrap();
    assert!(matches!(writer.delete(ada.id()), Err(AppError::DoesNotExist(_))));
    writer.destroy().unwrap();
}

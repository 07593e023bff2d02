/// Builds a [`ModelDeclaration`](crate::schema::ModelDeclaration) from a field list.
///
/// ```
/// use redorm::{model, Field};
///
/// let schema = model!(User {
///     email: Str,
///     username: Str,
///     age: Int => Field::int().default_value(0),
/// })
/// .unique_together(["email", "username"])
/// .build()
/// .unwrap();
/// assert_eq!(schema.table_name(), "users");
/// ```
#[macro_export]
macro_rules! model {
    (@field) => {
        ::core::option::Option::None
    };
    (@field $custom:expr) => {
        ::core::option::Option::Some($custom)
    };
    ($name:ident { $($field:ident : $tag:ident $(=> $custom:expr)?),+ $(,)? }) => {
        $crate::schema::ModelDeclaration::new(stringify!($name))
            $(.declare(stringify!($field), $crate::value::TypeTag::$tag, $crate::model!(@field $($custom)?)))+
    };
}

/// Keyword arguments as ordered `(name, Value)` pairs.
#[macro_export]
macro_rules! kwargs {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::value::Value)>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        ::std::vec![$((::std::string::String::from($key), $crate::value::Value::from($value))),+]
    };
}

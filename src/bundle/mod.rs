//! Save-game documents: ordered JSON objects with typed accessors,
//! polymorphic objects tagged by class name, and optional gzip framing.

mod files;
mod registry;

pub use files::{clean_temp_files, load_bundle, save_bundle, save_bundle_with, TEMP_SUFFIX};
pub use registry::{add_alias, add_aliases, instantiate, is_registered, register, register_as, resolve_class};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::any::Any;
use std::fmt;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Reserved key holding an object's class name.
pub const CLASS_NAME: &str = "__className";
/// Key wrapping a document whose root is an array.
pub const DEFAULT_KEY: &str = "key";
/// Whether saves are gzipped unless the caller says otherwise.
pub const DEFAULT_COMPRESSION: bool = true;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle i/o: {0}")]
    Io(#[from] io::Error),
    #[error("malformed bundle: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing key `{0}`")]
    Missing(String),
    #[error("key `{key}` does not hold {expected}")]
    WrongType { key: String, expected: &'static str },
    #[error("unknown class `{0}`")]
    UnknownClass(String),
    #[error("key `{key}`: unknown variant `{name}`")]
    Enum { key: String, name: String },
    #[error("bundle root must be an object or an array")]
    Root,
}

/// Downcasting for restored objects.
pub trait AsAny: Any {
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// An object that can be stored in and restored from a [`Bundle`].
/// Restorable types must be registered with [`register`].
pub trait Bundlable: AsAny + Send {
    /// Name written under [`CLASS_NAME`].
    fn class_name(&self) -> &'static str;

    fn store_in_bundle(&self, bundle: &mut Bundle);

    fn restore_from_bundle(&mut self, bundle: &Bundle) -> Result<(), BundleError>;
}

/// Downcasts a restored object.
pub fn downcast<T: Bundlable>(object: Box<dyn Bundlable>) -> Option<Box<T>> {
    object.into_any().downcast::<T>().ok()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bundle {
    data: Map<String, Value>,
}

impl fmt::Display for Bundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.data.clone()))
    }
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.data.shift_remove(key).is_some()
    }

    /// Keys in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.data.keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Scalars. Missing or mistyped values read as the type's zero value.

    pub fn get_bool(&self, key: &str) -> bool {
        self.data.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    pub fn get_int(&self, key: &str) -> i32 {
        self.get_long(key) as i32
    }

    pub fn get_long(&self, key: &str) -> i64 {
        match self.data.get(key) {
            Some(Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).unwrap_or(0),
            _ => 0,
        }
    }

    pub fn get_float(&self, key: &str) -> f32 {
        self.data.get(key).and_then(Value::as_f64).unwrap_or(0.0) as f32
    }

    pub fn get_string(&self, key: &str) -> String {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// Class name stored under `key`, after alias resolution. `None` when
    /// absent or not registered.
    pub fn get_class(&self, key: &str) -> Option<String> {
        let name = self.data.get(key)?.as_str()?;
        let name = name.strip_prefix("class ").unwrap_or(name);
        if name.is_empty() {
            return None;
        }
        let resolved = resolve_class(name);
        is_registered(&resolved).then_some(resolved)
    }

    pub fn get_bundle(&self, key: &str) -> Option<Bundle> {
        match self.data.get(key) {
            Some(Value::Object(map)) => Some(Bundle { data: map.clone() }),
            _ => None,
        }
    }

    /// Enum stored by variant name.
    pub fn get_enum<E: DeserializeOwned>(&self, key: &str) -> Result<E, BundleError> {
        let name = self
            .data
            .get(key)
            .ok_or_else(|| BundleError::Missing(key.to_string()))?
            .as_str()
            .ok_or_else(|| BundleError::WrongType {
                key: key.to_string(),
                expected: "an enum name",
            })?;
        serde_json::from_value(Value::String(name.to_string())).map_err(|_| BundleError::Enum {
            key: key.to_string(),
            name: name.to_string(),
        })
    }

    /// Polymorphic object under `key`. `Ok(None)` when absent.
    pub fn get_object(&self, key: &str) -> Result<Option<Box<dyn Bundlable>>, BundleError> {
        match self.get_bundle(key) {
            Some(bundle) => bundle.restore().map(Some),
            None => Ok(None),
        }
    }

    pub fn get_object_as<T: Bundlable>(&self, key: &str) -> Result<Option<Box<T>>, BundleError> {
        Ok(self.get_object(key)?.and_then(downcast::<T>))
    }

    /// Instantiates this bundle's tagged class and lets it restore itself.
    pub fn restore(&self) -> Result<Box<dyn Bundlable>, BundleError> {
        let name = self.get_string(CLASS_NAME);
        let mut object = instantiate(&name).ok_or(BundleError::UnknownClass(name))?;
        object.restore_from_bundle(self)?;
        Ok(object)
    }

    fn array(&self, key: &str) -> Result<&Vec<Value>, BundleError> {
        match self.data.get(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(_) => Err(BundleError::WrongType {
                key: key.to_string(),
                expected: "an array",
            }),
            None => Err(BundleError::Missing(key.to_string())),
        }
    }

    fn typed_array<T>(
        &self,
        key: &str,
        expected: &'static str,
        read: impl Fn(&Value) -> Option<T>,
    ) -> Result<Vec<T>, BundleError> {
        self.array(key)?
            .iter()
            .map(|v| {
                read(v).ok_or_else(|| BundleError::WrongType {
                    key: key.to_string(),
                    expected,
                })
            })
            .collect()
    }

    pub fn get_int_array(&self, key: &str) -> Result<Vec<i32>, BundleError> {
        self.typed_array(key, "integers", |v| v.as_i64().map(|n| n as i32))
    }

    pub fn get_long_array(&self, key: &str) -> Result<Vec<i64>, BundleError> {
        self.typed_array(key, "integers", Value::as_i64)
    }

    pub fn get_float_array(&self, key: &str) -> Result<Vec<f32>, BundleError> {
        self.typed_array(key, "numbers", |v| Some(v.as_f64().unwrap_or(0.0) as f32))
    }

    pub fn get_bool_array(&self, key: &str) -> Result<Vec<bool>, BundleError> {
        self.typed_array(key, "booleans", Value::as_bool)
    }

    pub fn get_string_array(&self, key: &str) -> Result<Vec<String>, BundleError> {
        self.typed_array(key, "strings", |v| v.as_str().map(str::to_string))
    }

    /// Class names with aliases resolved.
    pub fn get_class_array(&self, key: &str) -> Result<Vec<String>, BundleError> {
        self.typed_array(key, "class names", |v| {
            v.as_str()
                .map(|name| resolve_class(name.strip_prefix("class ").unwrap_or(name)))
        })
    }

    pub fn get_bundle_array(&self, key: &str) -> Result<Vec<Bundle>, BundleError> {
        self.typed_array(key, "objects", |v| match v {
            Value::Object(map) => Some(Bundle { data: map.clone() }),
            _ => None,
        })
    }

    /// Restores every tagged object in the array. Entries that cannot be
    /// restored are skipped with a warning.
    pub fn get_collection(&self, key: &str) -> Result<Vec<Box<dyn Bundlable>>, BundleError> {
        let mut restored = Vec::new();
        for (index, item) in self.array(key)?.iter().enumerate() {
            let Value::Object(map) = item else {
                log::warn!("bundle `{key}`[{index}]: not an object, skipped");
                continue;
            };
            let bundle = Bundle { data: map.clone() };
            match bundle.restore() {
                Ok(object) => restored.push(object),
                Err(err) => log::warn!("bundle `{key}`[{index}]: {err}, skipped"),
            }
        }
        Ok(restored)
    }

    // Writers.

    fn put_value(&mut self, key: &str, value: Value) {
        self.data.insert(key.to_string(), value);
    }

    pub fn put_bool(&mut self, key: &str, value: bool) {
        self.put_value(key, Value::Bool(value));
    }

    pub fn put_int(&mut self, key: &str, value: i32) {
        self.put_value(key, Value::from(value));
    }

    pub fn put_long(&mut self, key: &str, value: i64) {
        self.put_value(key, Value::from(value));
    }

    pub fn put_float(&mut self, key: &str, value: f32) {
        self.put_value(key, Value::from(value as f64));
    }

    pub fn put_string(&mut self, key: &str, value: &str) {
        self.put_value(key, Value::from(value));
    }

    pub fn put_class(&mut self, key: &str, class_name: &str) {
        self.put_value(key, Value::from(class_name));
    }

    pub fn put_bundle(&mut self, key: &str, bundle: &Bundle) {
        self.put_value(key, Value::Object(bundle.data.clone()));
    }

    /// Stores a unit enum variant by name.
    pub fn put_enum<E: Serialize>(&mut self, key: &str, value: &E) -> Result<(), BundleError> {
        match serde_json::to_value(value)? {
            name @ Value::String(_) => {
                self.put_value(key, name);
                Ok(())
            }
            _ => Err(BundleError::WrongType {
                key: key.to_string(),
                expected: "a unit enum variant",
            }),
        }
    }

    pub fn put_object(&mut self, key: &str, object: &dyn Bundlable) {
        self.put_value(key, Value::Object(store_object(object)));
    }

    pub fn put_int_array(&mut self, key: &str, values: &[i32]) {
        self.put_value(key, values.iter().copied().map(Value::from).collect());
    }

    pub fn put_long_array(&mut self, key: &str, values: &[i64]) {
        self.put_value(key, values.iter().copied().map(Value::from).collect());
    }

    pub fn put_float_array(&mut self, key: &str, values: &[f32]) {
        self.put_value(key, values.iter().map(|&v| Value::from(v as f64)).collect());
    }

    pub fn put_bool_array(&mut self, key: &str, values: &[bool]) {
        self.put_value(key, values.iter().copied().map(Value::from).collect());
    }

    pub fn put_string_array<S: AsRef<str>>(&mut self, key: &str, values: &[S]) {
        self.put_value(key, values.iter().map(|s| Value::from(s.as_ref())).collect());
    }

    pub fn put_class_array<S: AsRef<str>>(&mut self, key: &str, class_names: &[S]) {
        self.put_string_array(key, class_names);
    }

    pub fn put_bundle_array(&mut self, key: &str, bundles: &[Bundle]) {
        self.put_value(
            key,
            bundles.iter().map(|b| Value::Object(b.data.clone())).collect(),
        );
    }

    pub fn put_collection<'a>(&mut self, key: &str, objects: impl IntoIterator<Item = &'a dyn Bundlable>) {
        let items = objects
            .into_iter()
            .map(|object| Value::Object(store_object(object)))
            .collect();
        self.put_value(key, items);
    }

    // Streams.

    /// Writes the document as UTF-8 JSON, gzipped when `compressed`.
    pub fn to_stream<W: Write>(&self, writer: W, compressed: bool) -> Result<(), BundleError> {
        let text = serde_json::to_vec(&self.data)?;
        if compressed {
            let mut encoder = GzEncoder::new(writer, Compression::default());
            encoder.write_all(&text)?;
            encoder.finish()?.flush()?;
        } else {
            let mut writer = writer;
            writer.write_all(&text)?;
            writer.flush()?;
        }
        Ok(())
    }

    pub fn to_bytes(&self, compressed: bool) -> Result<Vec<u8>, BundleError> {
        let mut out = Vec::new();
        self.to_stream(&mut out, compressed)?;
        Ok(out)
    }

    /// Reads a document, detecting gzip by its magic bytes. An array root
    /// is wrapped under [`DEFAULT_KEY`].
    pub fn read<R: Read>(mut reader: R) -> Result<Bundle, BundleError> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        Self::from_bytes(&raw)
    }

    pub fn from_bytes(raw: &[u8]) -> Result<Bundle, BundleError> {
        let value: Value = if raw.starts_with(&GZIP_MAGIC) {
            let mut text = Vec::new();
            GzDecoder::new(raw).read_to_end(&mut text)?;
            serde_json::from_slice(&text)?
        } else {
            serde_json::from_slice(raw)?
        };
        match value {
            Value::Object(data) => Ok(Bundle { data }),
            array @ Value::Array(_) => {
                let mut data = Map::new();
                data.insert(DEFAULT_KEY.to_string(), array);
                Ok(Bundle { data })
            }
            _ => Err(BundleError::Root),
        }
    }
}

fn store_object(object: &dyn Bundlable) -> Map<String, Value> {
    let mut bundle = Bundle::new();
    bundle.put_string(CLASS_NAME, object.class_name());
    object.store_in_bundle(&mut bundle);
    bundle.data
}

use crate::imports::*;
use std::collections::{BTreeMap, HashMap};

/// Serialization formats understood by [SerdeAPI]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerdeFormat {
    Yaml,
    Json,
    #[cfg(feature = "bincode")]
    Bin,
}

impl SerdeFormat {
    /// Parses a format name or file extension, with or without the leading dot
    pub fn parse(format: &str) -> anyhow::Result<Self> {
        match format.trim_start_matches('.').to_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            #[cfg(feature = "bincode")]
            "bin" => Ok(Self::Bin),
            _ => bail!(
                "Unsupported format {format:?}, must be one of {:?}",
                Self::accepted()
            ),
        }
    }

    /// Format implied by the extension of `filepath`
    pub fn from_path(filepath: &Path) -> anyhow::Result<Self> {
        let extension = filepath
            .extension()
            .and_then(OsStr::to_str)
            .with_context(|| format!("File extension could not be parsed: {filepath:?}"))?;
        Self::parse(extension)
    }

    pub fn accepted() -> &'static [&'static str] {
        #[cfg(feature = "bincode")]
        return &["yaml", "json", "bin"];
        #[cfg(not(feature = "bincode"))]
        return &["yaml", "json"];
    }
}

/// File, string and reader round trips for serde types.
/// Every deserializing path runs [SerdeAPI::init] before handing the object out.
pub trait SerdeAPI: Serialize + for<'a> Deserialize<'a> {
    /// Validation or derived-state setup run after deserializing
    fn init(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Reads an object from a file packaged under the crate's `resources` folder
    #[cfg(feature = "resources")]
    fn from_resource<P: AsRef<Path>>(filepath: P) -> anyhow::Result<Self> {
        let filepath = filepath.as_ref();
        let format = SerdeFormat::from_path(filepath)?;
        Self::from_reader(crate::resources::resource_file(filepath)?.contents(), format)
    }

    /// Writes to `filepath`, choosing the format from its extension.
    /// An existing file is truncated.
    fn to_file<P: AsRef<Path>>(&self, filepath: P) -> anyhow::Result<()> {
        let filepath = filepath.as_ref();
        let format = SerdeFormat::from_path(filepath)?;
        let file = File::create(filepath)
            .with_context(|| format!("Could not create file: {filepath:?}"))?;
        self.to_writer(file, format)
    }

    /// Reads from `filepath`, choosing the format from its extension
    fn from_file<P: AsRef<Path>>(filepath: P) -> anyhow::Result<Self> {
        let filepath = filepath.as_ref();
        let format = SerdeFormat::from_path(filepath)?;
        let file = File::open(filepath).with_context(|| {
            if !filepath.exists() {
                format!("File not found: {filepath:?}")
            } else {
                format!("Could not open file: {filepath:?}")
            }
        })?;
        Self::from_reader(file, format)
    }

    fn to_writer<W: std::io::Write>(&self, wtr: W, format: SerdeFormat) -> anyhow::Result<()> {
        match format {
            SerdeFormat::Yaml => serde_yaml::to_writer(wtr, self)?,
            SerdeFormat::Json => serde_json::to_writer(wtr, self)?,
            #[cfg(feature = "bincode")]
            SerdeFormat::Bin => bincode::serialize_into(wtr, self)?,
        }
        Ok(())
    }

    fn from_reader<R: std::io::Read>(rdr: R, format: SerdeFormat) -> anyhow::Result<Self> {
        let mut obj: Self = match format {
            SerdeFormat::Yaml => serde_yaml::from_reader(rdr)?,
            SerdeFormat::Json => serde_json::from_reader(rdr)?,
            #[cfg(feature = "bincode")]
            SerdeFormat::Bin => bincode::deserialize_from(rdr)?,
        };
        obj.init()?;
        Ok(obj)
    }

    /// Serializes to a string in a text format (`"yaml"` or `"json"`)
    fn to_str(&self, format: &str) -> anyhow::Result<String> {
        match SerdeFormat::parse(format)? {
            SerdeFormat::Yaml => self.to_yaml(),
            SerdeFormat::Json => self.to_json(),
            #[allow(unreachable_patterns)]
            other => bail!("{other:?} is not a text format"),
        }
    }

    /// Deserializes from a string in a text format (`"yaml"` or `"json"`)
    fn from_str<S: AsRef<str>>(contents: S, format: &str) -> anyhow::Result<Self> {
        match SerdeFormat::parse(format)? {
            SerdeFormat::Yaml => Self::from_yaml(contents),
            SerdeFormat::Json => Self::from_json(contents),
            #[allow(unreachable_patterns)]
            other => bail!("{other:?} is not a text format"),
        }
    }

    fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string(&self)?)
    }

    fn from_json<S: AsRef<str>>(json_str: S) -> anyhow::Result<Self> {
        let mut obj: Self = serde_json::from_str(json_str.as_ref())?;
        obj.init()?;
        Ok(obj)
    }

    fn to_yaml(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(&self)?)
    }

    fn from_yaml<S: AsRef<str>>(yaml_str: S) -> anyhow::Result<Self> {
        let mut obj: Self = serde_yaml::from_str(yaml_str.as_ref())?;
        obj.init()?;
        Ok(obj)
    }

    #[cfg(feature = "bincode")]
    fn to_bincode(&self) -> anyhow::Result<Vec<u8>> {
        Ok(bincode::serialize(&self)?)
    }

    #[cfg(feature = "bincode")]
    fn from_bincode(encoded: &[u8]) -> anyhow::Result<Self> {
        let mut obj: Self = bincode::deserialize(encoded)?;
        obj.init()?;
        Ok(obj)
    }
}

/// Equality within a tolerance, used to compare simulation results
pub trait ApproxEq<Rhs = Self> {
    fn approx_eq(&self, other: &Rhs, tol: f64) -> bool;
}

macro_rules! impl_exact_approx_eq {
    ($($ty: ty),*) => {
        $(
            impl ApproxEq for $ty {
                fn approx_eq(&self, other: &Self, _tol: f64) -> bool {
                    self == other
                }
            }
        )*
    }
}

impl_exact_approx_eq!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, &str, String
);

/// Floats match when equal, or when their relative or absolute difference is
/// below `tol`
macro_rules! impl_float_approx_eq {
    ($($ty: ty),*) => {
        $(
            impl ApproxEq for $ty {
                fn approx_eq(&self, other: &Self, tol: f64) -> bool {
                    let diff = (*other - *self).abs() as f64;
                    let rel = diff / (*self + *other).abs() as f64;
                    self == other || rel < tol || diff < tol
                }
            }
        )*
    }
}

impl_float_approx_eq!(f32, f64);

fn approx_eq_seq<'a, T: ApproxEq + 'a>(
    a: impl ExactSizeIterator<Item = &'a T>,
    b: impl ExactSizeIterator<Item = &'a T>,
    tol: f64,
) -> bool {
    a.len() == b.len() && a.zip(b).all(|(x, y)| x.approx_eq(y, tol))
}

impl<T: ApproxEq> ApproxEq for Vec<T> {
    fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        approx_eq_seq(self.iter(), other.iter(), tol)
    }
}

impl<T: ApproxEq> ApproxEq for Array1<T> {
    fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        approx_eq_seq(self.iter(), other.iter(), tol)
    }
}

impl<T: ApproxEq> ApproxEq for Option<T> {
    fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.approx_eq(b, tol),
            (a, b) => a.is_none() && b.is_none(),
        }
    }
}

impl<K, V, S> ApproxEq for HashMap<K, V, S>
where
    K: Eq + std::hash::Hash,
    V: ApproxEq,
    S: std::hash::BuildHasher,
{
    fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).map_or(false, |w| v.approx_eq(w, tol)))
    }
}

impl<K: Ord, V: ApproxEq> ApproxEq for BTreeMap<K, V> {
    fn approx_eq(&self, other: &Self, tol: f64) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(k, v)| other.get(k).map_or(false, |w| v.approx_eq(w, tol)))
    }
}

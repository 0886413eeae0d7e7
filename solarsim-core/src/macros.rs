#[macro_export]
/// Generates a String similar to output of `dbg` but without printing
macro_rules! format_dbg {
    ($dbg_expr:expr) => {
        format!(
            "[{}:{}] {}: {:?}",
            file!(),
            line!(),
            stringify!($dbg_expr),
            $dbg_expr
        )
    };
    () => {
        format!("[{}:{}]", file!(), line!())
    };
}

#[macro_export]
/// Returns early with a [SimError::Validation](crate::error::SimError::Validation)
/// built from format args
macro_rules! bail_validation {
    ($($arg:tt)*) => {
        return Err(anyhow::Error::new($crate::error::SimError::Validation(format!($($arg)*))))
    };
}

#[macro_export]
/// Returns early with a [SimError::Configuration](crate::error::SimError::Configuration)
/// built from format args
macro_rules! bail_configuration {
    ($($arg:tt)*) => {
        return Err(anyhow::Error::new($crate::error::SimError::Configuration(format!($($arg)*))))
    };
}

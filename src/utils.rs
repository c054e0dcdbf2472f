use std::env;

#[macro_export]
macro_rules! S {
    ($x: expr) => {
        String::from($x)
    };
}

/// Read an environment variable, failing with the variable name if it is
/// missing or empty.
pub fn ensure_env_var(var_name: &str) -> Result<String, crate::core::errors::ImportError> {
    match env::var(var_name) {
        Ok(var) if !var.is_empty() => Ok(var),
        _ => Err(crate::core::errors::ImportError::Config(format!(
            "Missing env variable \"{}\"",
            var_name
        ))),
    }
}

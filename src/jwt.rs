pub mod claims;
pub mod discovery;
pub mod validator;

#[cfg(test)]
pub(crate) mod test_keys;

//! Storage connection strings

use crate::output::{Input, Output};

/// `DefaultEndpointsProtocol=https;AccountName={name};AccountKey={key}`.
///
/// The key is always treated as secret, so the result is secret even when
/// `key` itself was not marked.
pub fn build_connection_string(
    account_name: impl Into<Input<String>>,
    key: &Output<String>,
) -> Output<String> {
    account_name
        .into()
        .into_output()
        .combine(&key.into_secret(), |name, key| {
            format!("DefaultEndpointsProtocol=https;AccountName={name};AccountKey={key}")
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceId;

    #[test]
    fn test_connection_string_is_secret() {
        let connection = build_connection_string("acct1", &Output::secret("k1".to_string()));
        let value = connection.peek().unwrap().unwrap();
        assert!(value.is_secret());
        assert_eq!(
            value.expose(),
            "DefaultEndpointsProtocol=https;AccountName=acct1;AccountKey=k1"
        );
    }

    #[test]
    fn test_unmarked_key_still_taints() {
        let connection = build_connection_string("acct1", &Output::resolved("k1".to_string()));
        assert!(connection.is_secret());
    }

    #[test]
    fn test_waits_for_deferred_name_and_key() {
        let name = Output::for_resource(ResourceId::new(1), false);
        let key = Output::for_resource(ResourceId::new(1), true);
        let connection = build_connection_string(&name, &key);
        assert!(connection.peek().is_none());

        key.resolve("k1".to_string()).unwrap();
        assert!(connection.peek().is_none());
        name.resolve("acct1".to_string()).unwrap();
        assert_eq!(
            connection.peek().unwrap().unwrap().expose(),
            "DefaultEndpointsProtocol=https;AccountName=acct1;AccountKey=k1"
        );
    }
}

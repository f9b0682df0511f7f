use tracing::debug;

use super::CommandError;
use crate::config_file::TookConfig;
use crate::registry::ProtocolRegistry;
use crate::request::TokenRequest;

pub struct TokenCommand<'r> {
    registry: &'r ProtocolRegistry,
}

impl<'r> TokenCommand<'r> {
    pub fn new(registry: &'r ProtocolRegistry) -> Self {
        Self { registry }
    }

    /// Gets a credential for `remote`. On success the remote's credential store in `config` is
    /// replaced by the protocol's updated one; on failure `config` is left as it was.
    pub fn get_token(
        &self,
        config: &mut TookConfig,
        remote_name: &str,
        request: &TokenRequest,
    ) -> Result<String, CommandError> {
        let remote = config
            .remotes
            .get_mut(remote_name)
            .ok_or_else(|| CommandError::UnknownRemote(remote_name.to_string()))?;
        let mut protocol = self.registry.resolve(&remote.protocol).ok_or_else(|| {
            CommandError::UnknownProtocol(remote_name.to_string(), remote.protocol.clone())
        })?;

        *protocol.config_mut() = remote.config.clone();
        *protocol.defaults_mut() = config
            .defaults
            .get(&remote.protocol)
            .cloned()
            .unwrap_or_default();
        *protocol.store_mut() = remote.data.clone();

        debug!("getting token for remote {remote_name} with {}", remote.protocol);
        let credential = protocol.get_token(request)?;
        remote.data = protocol.store().clone();
        Ok(credential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProtocolConfig;
    use crate::config_file::Remote;
    use crate::registry::tests::FixedProtocol;
    use crate::store::CredentialStore;
    use crate::{GetTokenError, Protocol};
    use assert_matches::assert_matches;

    /// Answers with the effective client id, proving configuration and defaults were handed over.
    #[derive(Default)]
    struct ClientIdProtocol(FixedProtocol);

    impl Protocol for ClientIdProtocol {
        fn config_mut(&mut self) -> &mut ProtocolConfig {
            self.0.config_mut()
        }

        fn defaults_mut(&mut self) -> &mut ProtocolConfig {
            self.0.defaults_mut()
        }

        fn store_mut(&mut self) -> &mut CredentialStore {
            self.0.store_mut()
        }

        fn store(&self) -> &CredentialStore {
            self.0.store()
        }

        fn get_token(&mut self, request: &TokenRequest) -> Result<String, GetTokenError> {
            let merged = self.0.config.merge(&self.0.defaults);
            self.0.credential = merged.client_id()?.to_string();
            self.0.get_token(request)
        }
    }

    fn registry() -> ProtocolRegistry {
        let mut registry = ProtocolRegistry::new();
        registry.register("client-id", || Box::new(ClientIdProtocol::default()));
        registry
    }

    fn config_with(remote_config: ProtocolConfig) -> TookConfig {
        let mut config = TookConfig::default();
        config.defaults.insert(
            "client-id".to_string(),
            ProtocolConfig {
                client_id: Some("default-client".to_string()),
                ..Default::default()
            },
        );
        config.remotes.insert(
            "prod".to_string(),
            Remote {
                protocol: "client-id".to_string(),
                config: remote_config,
                data: CredentialStore::default(),
            },
        );
        config
    }

    #[test]
    fn defaults_apply_and_store_is_written_back() {
        let registry = registry();
        let mut config = config_with(ProtocolConfig::default());

        let credential = TokenCommand::new(&registry)
            .get_token(&mut config, "prod", &TokenRequest::for_user("alice"))
            .unwrap();

        assert_eq!(credential, "default-client");
        let data = &config.remotes["prod"].data;
        assert_eq!(data.last_username.as_deref(), Some("alice"));
        assert_eq!(
            data.find_by_username("alice").unwrap().access_token,
            "default-client"
        );
    }

    #[test]
    fn remote_configuration_wins() {
        let registry = registry();
        let mut config = config_with(ProtocolConfig {
            client_id: Some("mine".to_string()),
            ..Default::default()
        });

        let credential = TokenCommand::new(&registry)
            .get_token(&mut config, "prod", &TokenRequest::for_user("alice"))
            .unwrap();

        assert_eq!(credential, "mine");
    }

    #[test]
    fn failed_request_keeps_the_stored_data() {
        let registry = registry();
        let mut config = config_with(ProtocolConfig::default());
        let before = config.clone();

        let result =
            TokenCommand::new(&registry).get_token(&mut config, "prod", &TokenRequest::default());

        assert_matches!(
            result,
            Err(CommandError::GetToken(GetTokenError::MissingUsername))
        );
        assert_eq!(config, before);
    }

    #[test]
    fn unknown_remote() {
        let registry = registry();
        let mut config = TookConfig::default();

        let result =
            TokenCommand::new(&registry).get_token(&mut config, "prod", &TokenRequest::default());

        assert_matches!(result, Err(CommandError::UnknownRemote(name)) => assert_eq!(name, "prod"));
    }

    #[test]
    fn unknown_protocol() {
        let registry = ProtocolRegistry::new();
        let mut config = config_with(ProtocolConfig::default());

        let result =
            TokenCommand::new(&registry).get_token(&mut config, "prod", &TokenRequest::default());

        assert_matches!(
            result,
            Err(CommandError::UnknownProtocol(remote, protocol)) => {
                assert_eq!(remote, "prod");
                assert_eq!(protocol, "client-id");
            }
        );
    }
}

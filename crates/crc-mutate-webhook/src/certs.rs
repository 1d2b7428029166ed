use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use ::tracing::{info, warn};
use anyhow::{Result, anyhow};
use axum_server::tls_rustls::RustlsConfig;
use rustls::{
    RootCertStore, ServerConfig,
    server::{WebPkiClientVerifier, danger::ClientCertVerifier},
};
use rustls_pki_types::{CertificateDer, PrivateKeyDer, pem::PemObject};

use crate::config::TlsConfig;

/// Everything needed to build the rustls server configuration.
struct TlsMaterial {
    cert: CertificateDer<'static>,
    key: PrivateKeyDer<'static>,
    client_verifier: Option<Arc<dyn ClientCertVerifier>>,
}

impl TlsMaterial {
    async fn load(tls_config: &TlsConfig) -> Result<Self> {
        let (cert, key) = load_server_cert_and_key(&tls_config.cert_file, &tls_config.key_file).await?;
        let client_verifier = load_client_verifier(&tls_config.client_ca_file).await?;

        Ok(Self {
            cert,
            key,
            client_verifier,
        })
    }

    fn server_config(&self) -> Result<ServerConfig> {
        let builder = ServerConfig::builder();
        let builder = match &self.client_verifier {
            Some(verifier) => builder.with_client_cert_verifier(verifier.clone()),
            None => builder.with_no_client_auth(),
        };

        let mut server_config =
            builder.with_single_cert(vec![self.cert.clone()], self.key.clone_key())?;
        server_config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

        Ok(server_config)
    }
}

/// Build the TLS configuration of the server.
///
/// There's no watching of the certificate files on non-linux platforms
/// since we rely on inotify to watch for changes.
#[cfg(not(target_os = "linux"))]
pub(crate) async fn create_tls_config_and_watch_certificate_changes(
    tls_config: TlsConfig,
) -> Result<RustlsConfig> {
    let material = TlsMaterial::load(&tls_config).await?;
    Ok(RustlsConfig::from_config(Arc::new(material.server_config()?)))
}

/// Build the TLS configuration of the server and keep it in sync with the
/// files on disk.
///
/// The server certificate is reloaded once both the certificate and the key
/// files have been rewritten. The client CA bundle is reloaded as soon as one
/// of its files is rewritten. A reload that fails keeps the previous
/// configuration in place.
#[cfg(target_os = "linux")]
pub(crate) async fn create_tls_config_and_watch_certificate_changes(
    tls_config: TlsConfig,
) -> Result<RustlsConfig> {
    use ::tracing::error;
    use inotify::{Inotify, WatchMask};
    use tokio_stream::StreamExt;

    let mut material = TlsMaterial::load(&tls_config).await?;
    let rustls_config = RustlsConfig::from_config(Arc::new(material.server_config()?));
    let reloadable_config = rustls_config.clone();

    let inotify = Inotify::init().map_err(|e| anyhow!("Cannot initialize inotify: {e}"))?;
    let cert_watch = inotify
        .watches()
        .add(&tls_config.cert_file, WatchMask::CLOSE_WRITE)
        .map_err(|e| anyhow!("Cannot watch certificate file: {e}"))?;
    let key_watch = inotify
        .watches()
        .add(&tls_config.key_file, WatchMask::CLOSE_WRITE)
        .map_err(|e| anyhow!("Cannot watch key file: {e}"))?;
    let client_ca_watches = tls_config
        .client_ca_file
        .iter()
        .map(|path| {
            inotify
                .watches()
                .add(path, WatchMask::CLOSE_WRITE)
                .map_err(|e| anyhow!("Cannot watch client CA file: {e}"))
        })
        .collect::<Result<Vec<_>>>()?;

    let stream = inotify
        .into_event_stream([0; 1024])
        .map_err(|e| anyhow!("Cannot create inotify event stream: {e}"))?;

    tokio::spawn(async move {
        tokio::pin!(stream);
        let mut cert_changed = false;
        let mut key_changed = false;

        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("Cannot read inotify event: {e}");
                    continue;
                }
            };

            let mut reload = false;
            if event.wd == cert_watch {
                info!("TLS certificate file has been modified");
                cert_changed = true;
            }
            if event.wd == key_watch {
                info!("TLS key file has been modified");
                key_changed = true;
            }

            if client_ca_watches.contains(&event.wd) {
                info!("TLS client CA file has been modified, reloading client CA certificates");
                match load_client_verifier(&tls_config.client_ca_file).await {
                    Ok(verifier) => {
                        material.client_verifier = verifier;
                        reload = true;
                    }
                    Err(e) => error!("Failed to reload client CA certificates: {e}"),
                }
            }

            if cert_changed && key_changed {
                info!("Reloading server TLS certificate");
                cert_changed = false;
                key_changed = false;

                match load_server_cert_and_key(&tls_config.cert_file, &tls_config.key_file).await
                {
                    Ok((cert, key)) => {
                        material.cert = cert;
                        material.key = key;
                        reload = true;
                    }
                    Err(e) => error!("Failed to reload TLS certificate: {e}"),
                }
            }

            if !reload {
                continue;
            }
            match material.server_config() {
                Ok(server_config) => reloadable_config.reload_from_config(Arc::new(server_config)),
                Err(e) => error!("Failed to build TLS configuration: {e}"),
            }
        }
    });

    Ok(rustls_config)
}

async fn load_server_cert_and_key(
    cert_file: &Path,
    key_file: &Path,
) -> Result<(CertificateDer<'static>, PrivateKeyDer<'static>)> {
    let cert_contents = tokio::fs::read(cert_file)
        .await
        .map_err(|e| anyhow!("Cannot read certificate file {}: {e}", cert_file.display()))?;
    let key_contents = tokio::fs::read(key_file)
        .await
        .map_err(|e| anyhow!("Cannot read key file {}: {e}", key_file.display()))?;

    let mut certs = parse_pem_objects::<CertificateDer>(&cert_contents, "certificate");
    if certs.len() != 1 {
        return Err(anyhow!(
            "Expected exactly one certificate in certificate file, found {}",
            certs.len()
        ));
    }

    let mut keys = parse_pem_objects::<PrivateKeyDer>(&key_contents, "private key");
    if keys.len() != 1 {
        return Err(anyhow!(
            "Expected exactly one key in key file, found {}",
            keys.len()
        ));
    }

    Ok((certs.remove(0), keys.remove(0)))
}

async fn load_client_verifier(
    client_ca_files: &[PathBuf],
) -> Result<Option<Arc<dyn ClientCertVerifier>>> {
    if client_ca_files.is_empty() {
        return Ok(None);
    }

    let mut store = RootCertStore::empty();
    for client_ca_file in client_ca_files {
        let contents = tokio::fs::read(client_ca_file).await.map_err(|e| {
            anyhow!(
                "Cannot read client CA file {}: {e}",
                client_ca_file.display()
            )
        })?;
        let certs = parse_pem_objects::<CertificateDer>(&contents, "client CA certificate");
        let (added, ignored) = store.add_parsable_certificates(certs);
        info!(
            client_ca_certs_added = added,
            client_ca_certs_ignored = ignored,
            "Loaded client CA certificates"
        );
    }

    let verifier = WebPkiClientVerifier::builder(Arc::new(store))
        .build()
        .map_err(|e| anyhow!("Cannot build client verifier: {e}"))?;
    Ok(Some(verifier))
}

// Entries that cannot be parsed are skipped with a warning
fn parse_pem_objects<T: PemObject>(contents: &[u8], what: &str) -> Vec<T> {
    T::pem_slice_iter(contents)
        .filter_map(|item| {
            item.inspect_err(|e| warn!("Cannot parse {what}: {e}"))
                .ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rcgen::{CertificateParams, KeyPair};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn install_crypto_provider() {
        // another test may have installed it already
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    fn self_signed(name: &str) -> (String, String) {
        let key_pair = KeyPair::generate().unwrap();
        let cert = CertificateParams::new(vec![name.to_string()])
            .unwrap()
            .self_signed(&key_pair)
            .unwrap();
        (cert.pem(), key_pair.serialize_pem())
    }

    fn write_temp(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn load_valid_cert_and_key() {
        let (cert, key) = self_signed("localhost");
        let cert_file = write_temp(&cert);
        let key_file = write_temp(&key);

        let result = load_server_cert_and_key(cert_file.path(), key_file.path()).await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn reject_multiple_certificates() {
        let (cert_a, key) = self_signed("localhost");
        let (cert_b, _) = self_signed("example.com");
        let cert_file = write_temp(&format!("{cert_a}{cert_b}"));
        let key_file = write_temp(&key);

        let error = load_server_cert_and_key(cert_file.path(), key_file.path())
            .await
            .unwrap_err();

        assert!(error.to_string().contains("found 2"));
    }

    #[tokio::test]
    async fn reject_missing_key() {
        let (cert, _) = self_signed("localhost");
        let cert_file = write_temp(&cert);
        let key_file = write_temp("");

        let error = load_server_cert_and_key(cert_file.path(), key_file.path())
            .await
            .unwrap_err();

        assert!(error.to_string().contains("exactly one key"));
    }

    #[tokio::test]
    async fn no_client_ca_means_no_client_auth() {
        assert!(load_client_verifier(&[]).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn build_mtls_config() {
        install_crypto_provider();
        let (cert, key) = self_signed("localhost");
        let (ca, _) = self_signed("client-ca");
        let cert_file = write_temp(&cert);
        let key_file = write_temp(&key);
        let ca_file = write_temp(&ca);

        let tls_config = TlsConfig {
            cert_file: cert_file.path().to_path_buf(),
            key_file: key_file.path().to_path_buf(),
            client_ca_file: vec![ca_file.path().to_path_buf()],
        };
        let material = TlsMaterial::load(&tls_config).await.unwrap();

        assert!(material.client_verifier.is_some());
        assert!(material.server_config().is_ok());
    }
}

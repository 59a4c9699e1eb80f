/// The mesh's trusted root certificates.
///
/// The set is always rebuilt wholesale from the catalog's root list; the PEM
/// blobs are kept verbatim (in catalog order) and the DER contents of the
/// roots that parse form the verification pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootCertificateSet {
    active_root_id: String,
    pems: Vec<String>,
    anchors: Vec<Vec<u8>>,
}

impl RootCertificateSet {
    pub fn new(active_root_id: impl Into<String>, pems: impl IntoIterator<Item = String>) -> Self {
        let active_root_id = active_root_id.into();
        let pems = pems.into_iter().collect::<Vec<_>>();

        let mut anchors = Vec::with_capacity(pems.len());
        for (i, root) in pems.iter().enumerate() {
            match pem::parse(root.as_bytes()) {
                Ok(anchor) => anchors.push(anchor.contents().to_vec()),
                Err(error) => {
                    tracing::warn!(%error, root = i, %active_root_id, "Unable to add CA certificate to pool")
                }
            }
        }

        Self {
            active_root_id,
            pems,
            anchors,
        }
    }

    pub fn active_root_id(&self) -> &str {
        &self.active_root_id
    }

    /// The PEM-encoded roots, in catalog order.
    pub fn pems(&self) -> &[String] {
        &self.pems
    }

    /// DER-encoded roots that parsed successfully.
    pub fn anchors(&self) -> &[Vec<u8>] {
        &self.anchors
    }

    /// All roots concatenated into a single PEM bundle.
    pub fn bundle(&self) -> String {
        self.pems.concat()
    }

    pub fn is_empty(&self) -> bool {
        self.pems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = "-----BEGIN CERTIFICATE-----\nAAECAw==\n-----END CERTIFICATE-----\n";

    #[test]
    fn keeps_unparseable_roots_out_of_the_pool() {
        let roots = RootCertificateSet::new("root-1", vec![ROOT.to_string(), "CA1-PEM".to_string()]);
        assert_eq!(roots.active_root_id(), "root-1");
        assert_eq!(roots.pems().len(), 2);
        assert_eq!(roots.anchors().len(), 1);
        assert_eq!(roots.anchors(), &[vec![0u8, 1, 2, 3]]);
        assert_eq!(roots.bundle(), format!("{ROOT}CA1-PEM"));
    }
}

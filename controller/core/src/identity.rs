/// The gateway's own service registration, as reported by the catalog.
///
/// The `id` is expected to remain stable for the lifetime of the process; the
/// address and port may be refreshed when the registration changes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GatewayIdentity {
    pub id: String,
    pub name: String,
    pub address: String,
    pub port: u16,
}

/// Behavioral knobs that are not part of the registered client metadata
#[derive(Debug, Default, Clone)]
pub struct ClientOptions {
    /// `azp` values accepted in addition to the client's own `client_id`
    pub additional_authorized_parties: Option<Vec<String>>,
}

/// The five collection blobs the portal keeps in the config store, one data
/// id each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Users,
    InviteCodes,
    UserConfigs,
    UserServers,
    Servers,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::InviteCodes,
        Collection::UserConfigs,
        Collection::UserServers,
        Collection::Servers,
    ];

    pub fn data_id(self) -> &'static str {
        match self {
            Collection::Users => "portal-users",
            Collection::InviteCodes => "portal-invite-codes",
            Collection::UserConfigs => "portal-user-configs",
            Collection::UserServers => "portal-user-servers",
            Collection::Servers => "portal-servers",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct FolderQuery<'a> {
    pub folder: &'a str,
}

#[derive(Debug, Serialize)]
pub struct BrowseQuery<'a> {
    pub folder: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<u32>,
}

/// Query for `/rest/events`. `timeout` turns the request into a long poll.
#[derive(Debug, Serialize)]
pub struct EventsQuery {
    pub since: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

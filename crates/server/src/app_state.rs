use server_api::ApiContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) api: ApiContext,
}

impl AppState {
    pub(crate) fn new(api: ApiContext) -> Self {
        Self { api }
    }
}

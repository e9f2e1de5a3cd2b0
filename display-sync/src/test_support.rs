//! In-memory [`RemoteService`] used by the unit tests

use std::collections::HashMap;

use parking_lot::Mutex;
use xmds_api::{
    ApiError, GetFileRequest, GetResourceRequest, MediaInventory, RegisterDisplayRequest,
    RegisterDisplayResponse, RemoteService, RequiredFiles, Schedule, StatsBatch,
};

#[derive(Debug)]
struct MockState {
    register: Option<String>,
    required_files: Option<String>,
    schedule: Option<String>,
    files: HashMap<String, Vec<u8>>,
    resources: HashMap<(String, String, String), String>,
    file_requests: Vec<GetFileRequest>,
    resource_requests: Vec<GetResourceRequest>,
    stats: Vec<StatsBatch>,
    stats_calls: usize,
    inventories: Vec<MediaInventory>,
    fail_stats: bool,
    ack_stats: bool,
    fail_file: Option<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            register: None,
            required_files: None,
            schedule: None,
            files: HashMap::new(),
            resources: HashMap::new(),
            file_requests: Vec::new(),
            resource_requests: Vec::new(),
            stats: Vec::new(),
            stats_calls: 0,
            inventories: Vec::new(),
            fail_stats: false,
            ack_stats: true,
            fail_file: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockService {
    state: Mutex<MockState>,
}

fn unreachable_cms() -> ApiError {
    ApiError::NetworkError("connection refused".to_string())
}

impl MockService {
    pub fn set_register(&self, xml: &str) {
        self.state.lock().register = Some(xml.to_string());
    }

    pub fn set_required_files(&self, xml: Option<&str>) {
        self.state.lock().required_files = xml.map(str::to_string);
    }

    pub fn set_schedule(&self, xml: Option<&str>) {
        self.state.lock().schedule = xml.map(str::to_string);
    }

    pub fn add_file(&self, id: &str, content: &[u8]) {
        self.state.lock().files.insert(id.to_string(), content.to_vec());
    }

    pub fn add_resource(&self, layout: &str, region: &str, media: &str, html: &str) {
        self.state.lock().resources.insert(
            (layout.to_string(), region.to_string(), media.to_string()),
            html.to_string(),
        );
    }

    pub fn fail_file(&self, id: Option<&str>) {
        self.state.lock().fail_file = id.map(str::to_string);
    }

    pub fn fail_stats(&self, fail: bool) {
        self.state.lock().fail_stats = fail;
    }

    pub fn ack_stats(&self, ack: bool) {
        self.state.lock().ack_stats = ack;
    }

    pub fn file_requests(&self) -> Vec<GetFileRequest> {
        self.state.lock().file_requests.clone()
    }

    pub fn resource_requests(&self) -> Vec<GetResourceRequest> {
        self.state.lock().resource_requests.clone()
    }

    pub fn submitted_stats(&self) -> Vec<StatsBatch> {
        self.state.lock().stats.clone()
    }

    pub fn stats_calls(&self) -> usize {
        self.state.lock().stats_calls
    }

    pub fn inventories(&self) -> Vec<MediaInventory> {
        self.state.lock().inventories.clone()
    }
}

impl RemoteService for MockService {
    fn register_display(&self, _request: &RegisterDisplayRequest) -> xmds_api::Result<RegisterDisplayResponse> {
        match &self.state.lock().register {
            Some(xml) => RegisterDisplayResponse::parse(xml),
            None => Err(unreachable_cms()),
        }
    }

    fn required_files(&self) -> xmds_api::Result<RequiredFiles> {
        match &self.state.lock().required_files {
            Some(xml) => RequiredFiles::parse(xml),
            None => Err(unreachable_cms()),
        }
    }

    fn schedule(&self) -> xmds_api::Result<Schedule> {
        match &self.state.lock().schedule {
            Some(xml) => Schedule::parse(xml),
            None => Err(unreachable_cms()),
        }
    }

    fn get_file(&self, request: &GetFileRequest) -> xmds_api::Result<Vec<u8>> {
        let mut state = self.state.lock();
        state.file_requests.push(request.clone());
        if state.fail_file.as_deref() == Some(request.file_id.as_str()) {
            return Err(unreachable_cms());
        }

        let content = state
            .files
            .get(&request.file_id)
            .ok_or_else(|| ApiError::SoapFault {
                code: "Sender".to_string(),
                message: format!("unknown file {}", request.file_id),
            })?;
        let start = (request.chunk_offset as usize).min(content.len());
        let end = (start + request.chunk_size as usize).min(content.len());
        Ok(content[start..end].to_vec())
    }

    fn get_resource(&self, request: &GetResourceRequest) -> xmds_api::Result<String> {
        let mut state = self.state.lock();
        state.resource_requests.push(request.clone());
        let key = (
            request.layout_id.clone(),
            request.region_id.clone(),
            request.media_id.clone(),
        );
        state
            .resources
            .get(&key)
            .cloned()
            .ok_or_else(|| ApiError::InvalidResponse("empty resource".to_string()))
    }

    fn submit_stats(&self, batch: &StatsBatch) -> xmds_api::Result<bool> {
        let mut state = self.state.lock();
        state.stats_calls += 1;
        if state.fail_stats {
            return Err(unreachable_cms());
        }
        state.stats.push(batch.clone());
        Ok(state.ack_stats)
    }

    fn media_inventory(&self, inventory: &MediaInventory) -> xmds_api::Result<bool> {
        self.state.lock().inventories.push(inventory.clone());
        Ok(true)
    }
}

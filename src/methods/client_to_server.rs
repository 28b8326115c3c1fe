use serde_json::{Map, Value};
use tracing::trace;

use crate::{
    assembler::{Assembler, DatasetId, Nonce},
    capabilities::{Capabilities, Capability},
    error::Error,
    json_rpc::StandardRequest,
    methods::{GET_BLOCK_TEMPLATE, PROPOSAL_MODE, SUBMIT_BLOCK},
    template::{Template, MAX_BLOCK_VERSION},
};

#[cfg(test)]
use quickcheck::{Arbitrary, Gen};

/// _getblocktemplate({"capabilities": [...], "maxversion": n, "longpollid": "id"})_
///
/// Asks for a new template. `capabilities` lists the features the client understands, and
/// `longpollid`, when given, turns the call into a long poll that returns once the template
/// identified by it is stale.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkRequest {
    pub capabilities: Capabilities,
    pub longpoll_id: Option<String>,
}

impl WorkRequest {
    pub fn new(capabilities: Capabilities) -> Self {
        WorkRequest {
            capabilities,
            longpoll_id: None,
        }
    }

    pub fn with_longpoll_id(mut self, longpoll_id: impl Into<String>) -> Self {
        self.longpoll_id = Some(longpoll_id.into());
        self
    }

    fn params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        let names: Vec<Value> = self.capabilities.names().into_iter().map(Value::from).collect();
        params.insert("capabilities".to_string(), names.into());
        params.insert("maxversion".to_string(), MAX_BLOCK_VERSION.into());
        if let Some(lpid) = &self.longpoll_id {
            params.insert("longpollid".to_string(), lpid.clone().into());
        }
        params
    }
}

fn call(method: &str, params: Vec<Value>) -> StandardRequest {
    StandardRequest {
        id: 0,
        method: method.into(),
        params: params.into(),
    }
}

impl From<WorkRequest> for StandardRequest {
    fn from(req: WorkRequest) -> Self {
        call(GET_BLOCK_TEMPLATE, vec![req.params().into()])
    }
}

/// _getblocktemplate({"mode": "proposal", "data": "block hex", "workid": "id", ...})_
///
/// Asks the server to check a block built from `template` without proof of work. The sample
/// block uses dataset 1 when the template lets the coinbase be changed, dataset 0 otherwise,
/// and a zero nonce. `workid` is echoed unless the proposal is `foreign`.
pub fn propose<A: Assembler + ?Sized>(
    template: &Template,
    capabilities: Capabilities,
    foreign: bool,
    assembler: &A,
) -> Result<StandardRequest, Error> {
    let coinbase_mutable = Capability::CoinbaseAppend | Capability::CoinbaseSet;
    let dataset_id: DatasetId = if template.mutations().intersects(coinbase_mutable) {
        1
    } else {
        0
    };
    let sample = assembler.sample_data(template, dataset_id)?;
    let block_hex = assembler.assemble_submission(template, &sample, &[], dataset_id, 0, foreign)?;

    let mut params = WorkRequest::new(capabilities).params();
    params.insert("mode".to_string(), PROPOSAL_MODE.into());
    if let Some(workid) = echoed_workid(template, foreign) {
        params.insert("workid".to_string(), workid.into());
    }
    params.insert("data".to_string(), block_hex.into());
    trace!("Built proposal with dataset {}", dataset_id);
    Ok(call(GET_BLOCK_TEMPLATE, vec![params.into()]))
}

/// _submitblock("block hex", {"workid": "id"})_
///
/// Submits a solved block built from header `data` issued for `dataset_id`.
pub fn submit<A: Assembler + ?Sized>(
    template: &Template,
    data: &[u8],
    dataset_id: DatasetId,
    nonce: Nonce,
    assembler: &A,
) -> Result<StandardRequest, Error> {
    build_submission(template, data, &[], dataset_id, nonce, false, assembler)
}

/// Like [`submit`], for a block mined on a template obtained by someone else. The `workid` is
/// not echoed.
pub fn submit_foreign<A: Assembler + ?Sized>(
    template: &Template,
    data: &[u8],
    dataset_id: DatasetId,
    nonce: Nonce,
    assembler: &A,
) -> Result<StandardRequest, Error> {
    build_submission(template, data, &[], dataset_id, nonce, true, assembler)
}

/// Submits a block whose coinbase was extended with `extranonce`. Always uses dataset 0.
pub fn submit_with_extranonce<A: Assembler + ?Sized>(
    template: &Template,
    data: &[u8],
    extranonce: &[u8],
    nonce: Nonce,
    foreign: bool,
    assembler: &A,
) -> Result<StandardRequest, Error> {
    build_submission(template, data, extranonce, 0, nonce, foreign, assembler)
}

fn build_submission<A: Assembler + ?Sized>(
    template: &Template,
    data: &[u8],
    extranonce: &[u8],
    dataset_id: DatasetId,
    nonce: Nonce,
    foreign: bool,
    assembler: &A,
) -> Result<StandardRequest, Error> {
    let block_hex =
        assembler.assemble_submission(template, data, extranonce, dataset_id, nonce, foreign)?;
    let mut aux = Map::new();
    if let Some(workid) = echoed_workid(template, foreign) {
        aux.insert("workid".to_string(), workid.into());
    }
    trace!("Built submission for nonce {:08x}", nonce);
    Ok(call(SUBMIT_BLOCK, vec![block_hex.into(), aux.into()]))
}

fn echoed_workid(template: &Template, foreign: bool) -> Option<String> {
    if foreign {
        None
    } else {
        template.workid().map(str::to_string)
    }
}

#[cfg(test)]
impl Arbitrary for WorkRequest {
    fn arbitrary(g: &mut Gen) -> Self {
        WorkRequest {
            capabilities: Capabilities::arbitrary(g),
            longpoll_id: Option::<String>::arbitrary(g),
        }
    }
}

#[cfg(test)]
#[quickcheck_macros::quickcheck]
fn work_request_lists_each_capability_once(req: WorkRequest) -> bool {
    let expected: Vec<Value> = req.capabilities.names().into_iter().map(Value::from).collect();
    let lpid = req.longpoll_id.clone();
    let request: StandardRequest = req.into();
    let params = &request.params[0];
    params["capabilities"] == Value::from(expected)
        && params.get("longpollid").and_then(Value::as_str) == lpid.as_deref()
        && request.method == GET_BLOCK_TEMPLATE
}

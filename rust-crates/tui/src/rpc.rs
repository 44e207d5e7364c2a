use alloy::{
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::json_rpc::ErrorPayload,
    transports::{
        TransportError,
        http::reqwest::Url,
    },
};
use color_eyre::eyre::{
    Report,
    Result,
    WrapErr,
    eyre,
};
use flip_abi::decode_revert_reason;

/// Provider over the wallet or node endpoint at `url`.
///
/// Fillers stay disabled: the endpoint owns the signing account and fills
/// nonce, gas and chain id itself when it handles `eth_sendTransaction`.
pub fn connect(url: &str) -> Result<DynProvider> {
    let url: Url = url
        .parse()
        .wrap_err_with(|| format!("invalid JSON-RPC endpoint {url:?}"))?;
    Ok(ProviderBuilder::new()
        .disable_recommended_fillers()
        .connect_http(url)
        .erased())
}

/// Turns a transport failure into a report whose message keeps what the
/// wallet or node said, so it can be classified later.
pub fn describe(method: &str, err: TransportError) -> Report {
    match err.as_error_resp() {
        Some(payload) => eyre!(describe_payload(payload)).wrap_err(format!("{method} rejected")),
        None => Report::new(err).wrap_err(format!("{method} request failed")),
    }
}

/// `message (code N)`, plus the decoded `Error(string)` reason when the
/// endpoint returned the raw revert payload and the message lacks it.
pub fn describe_payload(payload: &ErrorPayload) -> String {
    let message = payload.message.as_ref();
    let reason = payload
        .as_revert_data()
        .and_then(|data| decode_revert_reason(&data));
    match reason {
        Some(reason) if !message.contains(&reason) => format!(
            "{message} (code {}): execution reverted: {reason}",
            payload.code
        ),
        _ => format!("{message} (code {})", payload.code),
    }
}

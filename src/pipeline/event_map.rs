//! Adapter stage: vendor JSON payloads → canonical deltas.
//!
//! The [`AdapterState`] is created fresh for every mapped stream and moved
//! through each `adapt` call; it never outlives the stream it belongs to.

use std::sync::Arc;

use futures::{stream, StreamExt};
use serde_json::Value;

use super::Mapper;
use crate::drivers::{AdapterState, ProviderDriver};
use crate::types::events::CanonicalDelta;
use crate::{BoxStream, PipeResult};

/// Maps payloads through one driver's adapter.
#[derive(Debug, Clone)]
pub struct DeltaMapper {
    driver: Arc<dyn ProviderDriver>,
    model: String,
}

impl DeltaMapper {
    pub fn new(driver: Arc<dyn ProviderDriver>, model: impl Into<String>) -> Self {
        Self {
            driver,
            model: model.into(),
        }
    }
}

struct MapState {
    input: Option<BoxStream<'static, Value>>,
    adapter: AdapterState,
    driver: Arc<dyn ProviderDriver>,
    model: String,
}

#[async_trait::async_trait]
impl Mapper for DeltaMapper {
    async fn map(
        &self,
        input: BoxStream<'static, Value>,
    ) -> PipeResult<BoxStream<'static, CanonicalDelta>> {
        let state = MapState {
            input: Some(input),
            adapter: AdapterState::default(),
            driver: self.driver.clone(),
            model: self.model.clone(),
        };

        let stream = stream::unfold(state, |mut st| async move {
            loop {
                let input = st.input.as_mut()?;
                match input.next().await {
                    Some(Ok(payload)) => {
                        match st.driver.adapt(st.adapter, &payload, &st.model) {
                            Ok((next, Some(delta))) => {
                                st.adapter = next;
                                return Some((Ok(delta), st));
                            }
                            Ok((next, None)) => {
                                st.adapter = next;
                            }
                            Err(e) => {
                                // A vendor error payload ends the stream.
                                st.input = None;
                                return Some((Err(e), st));
                            }
                        }
                    }
                    Some(Err(e)) => {
                        st.input = None;
                        return Some((Err(e), st));
                    }
                    None => return None,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

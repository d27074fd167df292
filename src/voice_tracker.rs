use serenity::all::Ready;
use serenity::async_trait;
use serenity::model::voice::VoiceState;
use serenity::prelude::*;
use std::sync::Arc;
use tracing::{error, info};

use crate::tracker::{PresenceTracker, PresenceTransition};

// 클라이언트 데이터에 보관되는 출석 추적기
pub struct PresenceTrackerKey;

impl TypeMapKey for PresenceTrackerKey {
    type Value = Arc<PresenceTracker>;
}

pub struct VoiceHandler;

#[async_trait]
impl EventHandler for VoiceHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!(user = %ready.user.name, guilds = ready.guilds.len(), "bot is ready");
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let data = ctx.data.read().await;
        let tracker = data.get::<PresenceTrackerKey>().cloned();
        drop(data);

        let Some(tracker) = tracker else {
            error!("presence tracker is missing from client data");
            return;
        };

        tracker.handle(transition(old.as_ref(), &new)).await;
    }
}

// 사용자명을 식별자로 사용
fn transition(old: Option<&VoiceState>, new: &VoiceState) -> PresenceTransition {
    PresenceTransition {
        identity: new.member.as_ref().map(|member| member.user.name.clone()),
        old_channel: old.and_then(|state| state.channel_id).map(|id| id.get()),
        new_channel: new.channel_id.map(|id| id.get()),
    }
}

// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Example: Drive session rotation with a manual clock.
//!
//! Run with:
//!   RUST_LOG=loom_rum=debug cargo run --example session_rotation -p loom-rum

use std::sync::Arc;

use chrono::Utc;
use loom_rum::{AgentSharedState, ManualClock, RumAgent, RumConfig};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loom_rum=info")),
		)
		.init();

	let dir = tempfile::tempdir()?;
	let config_path = dir.path().join("rum.toml");
	std::fs::write(
		&config_path,
		"[session]\nsample_rate = 0.5\ntimeout_secs = 60\n",
	)?;

	let mut config = RumConfig::load(Some(config_path.as_path()))?;
	config.storage.dir = Some(dir.path().join("state"));

	let clock = Arc::new(ManualClock::new(Utc::now()));
	let agent = RumAgent::builder()
		.config(config)
		.clock(clock.clone())
		.build()?;

	agent.session().add_listener(|notification| {
		println!("  notification: {} ({})", notification.name(), notification.session_id());
	});

	let shared = agent.shared_state();
	println!("user:    {}", agent.user_identifier()?);
	println!("session: {} sampled={}", shared.session_id(), agent.session().is_sampled());

	clock.advance(chrono::Duration::seconds(30));
	println!("after 30s:  {}", shared.session_id());

	clock.advance(chrono::Duration::seconds(61));
	println!("after idle: {}", shared.session_id());

	agent.did_enter_background()?;
	clock.advance(chrono::Duration::seconds(120));
	agent.will_enter_foreground()?;
	println!("after background: {}", shared.session_id());

	for item in agent.session().history() {
		println!("  {} started {} closed={}", item.id(), item.start(), item.is_closed());
	}

	agent.shutdown()?;
	Ok(())
}

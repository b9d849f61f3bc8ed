use izzy_ngin::{app, config::SceneConfig};

fn main() -> anyhow::Result<()> {
    app::run(SceneConfig::from_env())
}

fn main() -> anyhow::Result<()> {
    emotion_tracker_lib::run()
}

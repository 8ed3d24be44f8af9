fn main() -> anyhow::Result<()> {
    envbox_cli::run()
}

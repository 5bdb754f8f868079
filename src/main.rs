fn main() -> anyhow::Result<()> {
    laser_trail::run()
}

fn main() {
    transport_preview::cli::run();
}

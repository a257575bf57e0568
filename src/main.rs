fn main() {
    ppm_prog::cli::run();
}

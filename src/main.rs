fn main() {
    ivee::run();
}

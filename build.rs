fn main() {
    // Emits the ESP-IDF environment cargo directives when building for
    // the espidf target; a no-op on host builds.
    embuild::espidf::sysenv::output();
}

fn main() {
    // ESP-IDF link arguments are only needed for the device binary; host
    // builds (`cargo test`) compile the library without the toolchain.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}

use std::sync::OnceLock;

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
        .unwrap_or(default)
}

// OAM DMA triggers and completions
pub fn dma() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("DEBUG_DMA", false))
}

// Mapper register writes that change the selected ROM bank
pub fn mapper() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("DEBUG_MAPPER", false))
}

// Start with the boot overlay already unmapped (PC at 0x0100).
pub fn skip_boot_rom() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("SKIP_BOOT_ROM", false))
}

// Let tooling write VRAM during mode 3.
pub fn permissive_vram() -> bool {
    static ON: OnceLock<bool> = OnceLock::new();
    *ON.get_or_init(|| env_flag("PERMISSIVE_VRAM", false))
}

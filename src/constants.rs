/// CAS（Compare-And-Swap）操作最大重试次数
pub const MAX_CAS_RETRIES: u32 = 20;

/// 列表接口默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// 列表接口最大分页大小
pub const MAX_PAGE_SIZE: u64 = 100;

/// Upper bound on terms accepted by one bulk request.
pub const MAX_BULK_TERMS: usize = 200;

/// Words examined per image sweep run.
pub const IMAGE_SWEEP_BATCH: usize = 50;

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const IMAGE_CONTENT_TYPE: &str = "image/png";

/// 默认多模态图像输出节点
pub const DEFAULT_OUTPUT_NODE: &str = "9";

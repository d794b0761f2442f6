// 分片大小决策
//
// Glacier 分片上传规则：
// - 单次上传最多 10000 个分片
// - 分片大小必须是 1MB 乘以 2 的幂，范围 1MB ~ 4GB
//
// decide_part_size 只保证分片数量不超限，初始值是否合法由配置层校验

/// 单次分片上传允许的最大分片数
pub const MAX_PARTS: u64 = 10_000;

/// 最小分片大小: 1MB
pub const MIN_PART_SIZE: u64 = 1024 * 1024;

/// 最大分片大小: 4GB
pub const MAX_PART_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// 默认分片大小: 1MB
pub const DEFAULT_PART_SIZE: u64 = MIN_PART_SIZE;

/// 根据文件大小计算分片大小
///
/// 从 `requested_part_size` 开始不断翻倍，直到 `file_size / part_size <= 10000`
///
/// # 参数
/// * `file_size` - 文件大小（字节）
/// * `requested_part_size` - 期望的分片大小（字节，必须大于 0）
pub fn decide_part_size(file_size: u64, requested_part_size: u64) -> u64 {
    let mut part_size = requested_part_size.max(1);
    // 等价于 file_size / part_size > MAX_PARTS（实数除法），用乘法避免精度问题
    while u128::from(file_size) > u128::from(part_size) * u128::from(MAX_PARTS) {
        part_size *= 2;
    }
    part_size
}

/// 分片大小是否被服务端接受
pub fn is_valid_part_size(part_size: u64) -> bool {
    part_size.is_power_of_two() && (MIN_PART_SIZE..=MAX_PART_SIZE).contains(&part_size)
}

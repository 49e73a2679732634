use crate::error::{AppError, Result};
use crate::models::user::{ProfileData, SocialLinks};
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

pub const MAX_DISPLAY_NAME_LENGTH: usize = 50;
pub const MAX_PHONE_LENGTH: usize = 20;

/// 邮箱验证工具函数
pub fn validate_email(email: &str) -> bool {
    validator::validate_email(email)
}

/// 验证显示名称格式
pub fn validate_display_name(display_name: &str) -> Result<()> {
    if display_name.trim().is_empty() {
        return Err(AppError::Validation("Il nome visualizzato è obbligatorio".to_string()));
    }

    if display_name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
        return Err(AppError::Validation(format!(
            "Il nome visualizzato non può superare {} caratteri",
            MAX_DISPLAY_NAME_LENGTH
        )));
    }

    Ok(())
}

pub fn validate_bio(bio: &str, max_length: usize) -> Result<()> {
    if bio.chars().count() > max_length {
        return Err(AppError::Validation(format!(
            "La biografia non può superare {} caratteri",
            max_length
        )));
    }
    Ok(())
}

/// 次要邮箱为空时不校验
pub fn validate_secondary_email(email: &str) -> Result<()> {
    let email = email.trim();
    if email.is_empty() {
        return Ok(());
    }

    if !validate_email(email) || email.len() > 254 {
        return Err(AppError::Validation("Email secondaria non valida".to_string()));
    }

    Ok(())
}

pub fn validate_phone_number(phone: &str) -> Result<()> {
    static PHONE: OnceLock<Regex> = OnceLock::new();

    let pattern = PHONE.get_or_init(|| Regex::new(r"^[0-9 +\-()]+$").expect("phone pattern"));

    if phone.chars().count() > MAX_PHONE_LENGTH || !pattern.is_match(phone) {
        return Err(AppError::Validation(format!("Numero di telefono non valido: {}", phone)));
    }

    Ok(())
}

/// 去掉空白号码，但至少保留一个输入槽位
pub fn normalize_phone_numbers(numbers: &[String]) -> Result<Vec<String>> {
    let mut cleaned = Vec::with_capacity(numbers.len());
    for number in numbers {
        let number = number.trim();
        if number.is_empty() {
            continue;
        }
        validate_phone_number(number)?;
        cleaned.push(number.to_string());
    }

    if cleaned.is_empty() {
        cleaned.push(String::new());
    }
    Ok(cleaned)
}

/// 社交链接必须是 http(s) 地址
pub fn validate_social_links(links: &SocialLinks) -> Result<()> {
    for (network, link) in links.entries() {
        let Some(link) = link else { continue };
        let link = link.trim();
        if link.is_empty() {
            continue;
        }

        let valid = Url::parse(link)
            .map(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
            .unwrap_or(false);

        if !valid {
            return Err(AppError::Validation(format!("Link {} non valido", network)));
        }
    }
    Ok(())
}

/// 校验并规范化个人资料表单
pub fn validate_profile(data: &ProfileData, max_bio_length: usize) -> Result<ProfileData> {
    validate_display_name(&data.display_name)?;
    validate_bio(&data.bio, max_bio_length)?;
    validate_secondary_email(&data.secondary_email)?;
    validate_social_links(&data.social_links)?;

    Ok(ProfileData {
        display_name: data.display_name.trim().to_string(),
        photo_url: data.photo_url.trim().to_string(),
        bio: data.bio.trim().to_string(),
        phone_numbers: normalize_phone_numbers(&data.phone_numbers)?,
        secondary_email: data.secondary_email.trim().to_string(),
        social_links: data.social_links.normalized(),
    })
}

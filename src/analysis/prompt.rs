use crate::profile::dto::UserProfile;

/// Instruction block sent next to the image. The product speaks Arabic, so does the prompt.
pub fn build_prompt(user: &UserProfile) -> String {
    format!(
        "أنت خبير تغذية عالمي. قم بتحليل صورة الطعام هذه بدقة عالية.\n\
         \n\
         بيانات المستخدم (لتقديم نصيحة مخصصة):\n\
         - الاسم: {name}\n\
         - الوزن: {weight} كجم\n\
         - الطول: {height} سم\n\
         - العمر: {age} سنة\n\
         \n\
         المطلوب:\n\
         1. تعرف على نوع الطعام ومكوناته.\n\
         2. قدر السعرات الحرارية الإجمالية.\n\
         3. قدر القيم الغذائية (بروتين، كارب، دهون) بالأرقام.\n\
         4. قدم نصيحة صحية مفيدة ومختصرة جداً موجهة لهذا المستخدم بأسلوب مشجع.\n\
         \n\
         يجب أن يكون الرد بنسق JSON فقط.\n",
        name = user.name,
        weight = user.weight,
        height = user.height,
        age = user.age,
    )
}

#[cfg(test)]
mod prompt_tests {
    use super::*;

    #[test]
    fn prompt_interpolates_profile_without_trailing_decimals() {
        let prompt = build_prompt(&UserProfile {
            name: "Sara".into(),
            weight: 60.0,
            height: 165.0,
            age: 30.0,
        });
        assert!(prompt.contains("الاسم: Sara"));
        assert!(prompt.contains("الوزن: 60 كجم"));
        assert!(prompt.contains("الطول: 165 سم"));
        assert!(prompt.contains("العمر: 30 سنة"));
        assert!(prompt.contains("JSON"));
    }

    #[test]
    fn fractional_weight_is_kept() {
        let prompt = build_prompt(&UserProfile {
            name: "Omar".into(),
            weight: 72.5,
            height: 180.0,
            age: 41.0,
        });
        assert!(prompt.contains("الوزن: 72.5 كجم"));
    }
}

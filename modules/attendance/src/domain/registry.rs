use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::contract::model::{Class, ClassInput, Student, StudentInput, User};
use crate::domain::error::DomainError;
use crate::domain::policy;
use crate::domain::store::{Collection, Filter};

/// Look a class up and check the actor may act on it. Existence is checked
/// first, so an unknown id yields `ClassNotFound` even for non-owners.
pub(crate) async fn authorize_class(
    classes: &Collection<Class>,
    actor: &User,
    class_id: &str,
    reason: &str,
) -> Result<Class, DomainError> {
    let class = classes
        .find_by_id(class_id)
        .await?
        .ok_or_else(|| DomainError::class_not_found(class_id))?;
    policy::ensure_can_mutate(actor, &class.teacher_id, reason)?;
    Ok(class)
}

/// Class and student CRUD, with the ownership policy applied before every write.
pub struct RegistryService {
    classes: Collection<Class>,
    students: Collection<Student>,
    list_limit: usize,
}

impl RegistryService {
    pub fn new(classes: Collection<Class>, students: Collection<Student>, list_limit: usize) -> Self {
        Self {
            classes,
            students,
            list_limit,
        }
    }

    /// Admins see every class, teachers only their own.
    pub async fn list_classes(&self, actor: &User) -> Result<Vec<Class>, DomainError> {
        let filter = if actor.is_admin() {
            Filter::all()
        } else {
            Filter::all().eq("teacher_id", actor.id.as_str())
        };
        self.classes.find_limited(&filter, self.list_limit).await
    }

    #[instrument(name = "attendance.registry.create_class", skip(self, actor, input), fields(actor = %actor.id))]
    pub async fn create_class(&self, actor: &User, input: ClassInput) -> Result<Class, DomainError> {
        policy::ensure_can_mutate(
            actor,
            &input.teacher_id,
            "Not authorized to create class for another teacher",
        )?;

        let class = Class {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            subject: input.subject,
            teacher_id: input.teacher_id,
            created_at: Utc::now(),
        };
        self.classes.insert(&class).await?;
        info!(class_id = %class.id, "class created");
        Ok(class)
    }

    #[instrument(name = "attendance.registry.update_class", skip(self, actor, input), fields(actor = %actor.id))]
    pub async fn update_class(
        &self,
        actor: &User,
        id: &str,
        input: ClassInput,
    ) -> Result<Class, DomainError> {
        let existing =
            authorize_class(&self.classes, actor, id, "Not authorized to update this class")
                .await?;

        let updated = Class {
            id: existing.id,
            name: input.name,
            subject: input.subject,
            teacher_id: input.teacher_id,
            created_at: existing.created_at,
        };
        if !self.classes.replace_by_id(&updated).await? {
            return Err(DomainError::class_not_found(id));
        }
        info!(class_id = %updated.id, "class updated");
        Ok(updated)
    }

    #[instrument(name = "attendance.registry.delete_class", skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_class(&self, actor: &User, id: &str) -> Result<(), DomainError> {
        authorize_class(&self.classes, actor, id, "Not authorized to delete this class").await?;
        // Students of the class are left in place.
        self.classes.delete_by_id(id).await?;
        info!(class_id = %id, "class deleted");
        Ok(())
    }

    /// Not filtered by ownership: any authenticated user may list any class's students.
    /// An empty `class_id` means no filter.
    pub async fn list_students(
        &self,
        _actor: &User,
        class_id: Option<&str>,
    ) -> Result<Vec<Student>, DomainError> {
        let filter = match class_id.filter(|c| !c.is_empty()) {
            Some(class_id) => Filter::all().eq("class_id", class_id),
            None => Filter::all(),
        };
        self.students.find_limited(&filter, self.list_limit).await
    }

    #[instrument(name = "attendance.registry.create_student", skip(self, actor, input), fields(actor = %actor.id, class_id = %input.class_id))]
    pub async fn create_student(
        &self,
        actor: &User,
        input: StudentInput,
    ) -> Result<Student, DomainError> {
        authorize_class(
            &self.classes,
            actor,
            &input.class_id,
            "Not authorized to add student to this class",
        )
        .await?;

        let student = Student {
            id: Uuid::new_v4().to_string(),
            name: input.name,
            email: input.email,
            class_id: input.class_id,
            roll_number: input.roll_number,
            created_at: Utc::now(),
        };
        self.students.insert(&student).await?;
        info!(student_id = %student.id, "student created");
        Ok(student)
    }

    /// Permission is checked against the class named in the payload, not the
    /// student's current class.
    #[instrument(name = "attendance.registry.update_student", skip(self, actor, input), fields(actor = %actor.id))]
    pub async fn update_student(
        &self,
        actor: &User,
        id: &str,
        input: StudentInput,
    ) -> Result<Student, DomainError> {
        let existing = self
            .students
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::student_not_found(id))?;
        authorize_class(
            &self.classes,
            actor,
            &input.class_id,
            "Not authorized to update this student",
        )
        .await?;

        let updated = Student {
            id: existing.id,
            name: input.name,
            email: input.email,
            class_id: input.class_id,
            roll_number: input.roll_number,
            created_at: existing.created_at,
        };
        if !self.students.replace_by_id(&updated).await? {
            return Err(DomainError::student_not_found(id));
        }
        info!(student_id = %updated.id, "student updated");
        Ok(updated)
    }

    #[instrument(name = "attendance.registry.delete_student", skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_student(&self, actor: &User, id: &str) -> Result<(), DomainError> {
        let student = self
            .students
            .find_by_id(id)
            .await?
            .ok_or_else(|| DomainError::student_not_found(id))?;

        let reason = "Not authorized to delete this student";
        match self.classes.find_by_id(&student.class_id).await? {
            Some(class) => policy::ensure_can_mutate(actor, &class.teacher_id, reason)?,
            // Orphaned by a class delete: nobody owns it any more.
            None => policy::ensure_admin(actor).map_err(|_| DomainError::forbidden(reason))?,
        }

        self.students.delete_by_id(id).await?;
        info!(student_id = %id, "student deleted");
        Ok(())
    }
}
